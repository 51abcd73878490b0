//! Interactive control surface: manual fetch, interval changes and ping-gated injection

use crate::bus::{ContextId, Delivery, Message, MessageBus, Response};
use crate::injector::panel::{copy_with_fallback, Clipboard, ClipboardError, CopyChannel};
use crate::models::signal::CanonicalSignal;
use crate::signals::format_for_clipboard;
use crate::storage::{self, keys, KeyValueStore, StorageError};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("No signal available. Fetch a signal first.")]
    NoSignal,
    #[error("Page not ready. Please refresh the page.")]
    PageNotLoaded,
    #[error("background context is not running")]
    BackgroundUnavailable,
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Ready,
    RefreshNeeded,
}

pub struct ControlSurface {
    bus: MessageBus,
    storage: Arc<dyn KeyValueStore>,
}

impl ControlSurface {
    pub fn new(bus: MessageBus, storage: Arc<dyn KeyValueStore>) -> Self {
        Self { bus, storage }
    }

    pub async fn last_signal(&self) -> Result<Option<CanonicalSignal>, ControlError> {
        Ok(storage::load(self.storage.as_ref(), keys::LAST_SIGNAL).await?)
    }

    pub async fn is_connected(&self) -> Result<bool, ControlError> {
        Ok(storage::load(self.storage.as_ref(), keys::IS_CONNECTED)
            .await?
            .unwrap_or(false))
    }

    /// Ask the background context for an immediate poll
    pub async fn fetch_now(&self) -> Result<(), ControlError> {
        let delivery = self.bus.send(ContextId::Background, Message::FetchNow).await;
        expect_success(delivery, ControlError::BackgroundUnavailable)
    }

    /// Persist a new poll interval and hand it to the background context
    pub async fn set_interval(&self, seconds: u64) -> Result<(), ControlError> {
        self.storage
            .set(keys::REFRESH_INTERVAL, json!(seconds))
            .await?;
        let delivery = self
            .bus
            .send(ContextId::Background, Message::UpdateInterval { interval: seconds })
            .await;
        expect_success(delivery, ControlError::BackgroundUnavailable)?;
        info!(interval = seconds, "ControlSurface: poll interval updated");
        Ok(())
    }

    pub async fn page_status(&self, page: u32) -> PageStatus {
        if self.bus.ping(ContextId::Page(page)).await {
            PageStatus::Ready
        } else {
            PageStatus::RefreshNeeded
        }
    }

    /// Send the cached signal to a page, but only once the page has answered a ping
    pub async fn inject(&self, page: u32) -> Result<(), ControlError> {
        let signal = self.last_signal().await?.ok_or(ControlError::NoSignal)?;

        if self.page_status(page).await != PageStatus::Ready {
            warn!(page, "ControlSurface: page did not answer ping");
            return Err(ControlError::PageNotLoaded);
        }

        let delivery = self
            .bus
            .send(ContextId::Page(page), Message::InjectSignal { signal })
            .await;
        expect_success(delivery, ControlError::PageNotLoaded)?;
        info!(page, "ControlSurface: signal sent to page");
        Ok(())
    }

    /// Copy the cached signal's clipboard block
    pub async fn copy_signal(
        &self,
        clipboard: &dyn Clipboard,
    ) -> Result<CopyChannel, ControlError> {
        let signal = self.last_signal().await?.ok_or(ControlError::NoSignal)?;
        let channel = copy_with_fallback(clipboard, &format_for_clipboard(&signal)).await?;
        Ok(channel)
    }
}

fn expect_success(delivery: Delivery, absent: ControlError) -> Result<(), ControlError> {
    match delivery {
        Delivery::Answered(Response::Outcome { success: true, .. }) => Ok(()),
        Delivery::Answered(Response::Outcome { error, .. }) => Err(ControlError::Rejected(
            error.unwrap_or_else(|| "request failed".to_string()),
        )),
        Delivery::Answered(Response::Pong { .. }) => {
            Err(ControlError::Rejected("unexpected pong".to_string()))
        }
        Delivery::NoResponse | Delivery::NotLoaded => Err(absent),
    }
}
