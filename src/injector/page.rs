//! Message handler for the script running inside a host page

use super::dom::HostDocument;
use super::{FieldInjector, InjectionReport, InjectError};
use crate::bus::{Message, MessageHandler, Response};
use crate::models::signal::CanonicalSignal;
use crate::storage::{self, keys, KeyValueStore, StorageError};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct PageAgent<D: HostDocument> {
    injector: FieldInjector<D>,
    current: RwLock<Option<CanonicalSignal>>,
}

impl<D: HostDocument> PageAgent<D> {
    pub fn new(injector: FieldInjector<D>) -> Self {
        Self {
            injector,
            current: RwLock::new(None),
        }
    }

    /// Pick up the last cached signal when the page script loads
    pub async fn restore(&self, store: &dyn KeyValueStore) -> Result<bool, StorageError> {
        let signal: Option<CanonicalSignal> = storage::load(store, keys::LAST_SIGNAL).await?;
        let found = signal.is_some();
        if found {
            debug!("PageAgent: restored last signal from storage");
        }
        *self.current.write().await = signal;
        Ok(found)
    }

    pub async fn current_signal(&self) -> Option<CanonicalSignal> {
        self.current.read().await.clone()
    }

    pub async fn inject(&self, signal: &CanonicalSignal) -> Result<InjectionReport, InjectError> {
        *self.current.write().await = Some(signal.clone());
        self.injector.inject(signal).await
    }
}

#[async_trait]
impl<D: HostDocument + 'static> MessageHandler for PageAgent<D> {
    async fn handle(&self, message: Message) -> Option<Response> {
        match message {
            Message::Ping => Some(Response::pong()),
            Message::InjectSignal { signal } => match self.inject(&signal).await {
                Ok(report) => {
                    info!(
                        pair = %signal.pair,
                        surface_found = report.surface_found,
                        written = report.written.len(),
                        "PageAgent: signal injected"
                    );
                    Some(Response::ok())
                }
                Err(e) => {
                    warn!(error = %e, "PageAgent: injection rejected");
                    Some(Response::failed(e.to_string()))
                }
            },
            Message::SignalUpdated { signal } => {
                debug!(pair = %signal.pair, "PageAgent: signal updated");
                *self.current.write().await = Some(signal);
                None
            }
            other => {
                debug!(action = other.action(), "PageAgent: ignoring message");
                None
            }
        }
    }
}
