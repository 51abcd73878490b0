//! Cross-context message bus.
//!
//! Three kinds of execution context talk over the bus: the background agent,
//! the interactive control surface and scripts running inside host pages.
//! Every request resolves to exactly one [`Delivery`]: an answer, an explicit
//! "no response", or `NotLoaded` when nobody is listening. Absence is detected
//! through channel closure, never through a timer.

use crate::models::signal::CanonicalSignal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextId {
    Background,
    ControlSurface,
    /// A script injected into a host page, keyed by tab id
    Page(u32),
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextId::Background => f.write_str("background"),
            ContextId::ControlSurface => f.write_str("control-surface"),
            ContextId::Page(tab) => write!(f, "page#{}", tab),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    Ping,
    InjectSignal { signal: CanonicalSignal },
    SignalUpdated { signal: CanonicalSignal },
    FetchNow,
    UpdateInterval { interval: u64 },
}

impl Message {
    pub fn action(&self) -> &'static str {
        match self {
            Message::Ping => "ping",
            Message::InjectSignal { .. } => "injectSignal",
            Message::SignalUpdated { .. } => "signalUpdated",
            Message::FetchNow => "fetchNow",
            Message::UpdateInterval { .. } => "updateInterval",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Pong {
        status: String,
        loaded: bool,
    },
    Outcome {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Response {
    pub fn pong() -> Self {
        Response::Pong {
            status: "pong".to_string(),
            loaded: true,
        }
    }

    pub fn ok() -> Self {
        Response::Outcome {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Response::Outcome {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Result of a request
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Answered(Response),
    NoResponse,
    NotLoaded,
}

/// A context's message handler. Returning `None` means "no response".
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: Message) -> Option<Response>;
}

struct Envelope {
    message: Message,
    reply: Option<oneshot::Sender<Option<Response>>>,
}

type Registry = HashMap<ContextId, mpsc::UnboundedSender<Envelope>>;

#[derive(Clone, Default)]
pub struct MessageBus {
    contexts: Arc<RwLock<Registry>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `context` and start delivering its messages to `handler`.
    ///
    /// Each message runs on its own task, so a slow handler does not hold up a ping.
    /// Registering an already-registered context replaces the previous listener.
    pub async fn listen(&self, context: ContextId, handler: Arc<dyn MessageHandler>) -> Listener {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        self.contexts.write().await.insert(context, tx.clone());

        let task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let handler = handler.clone();
                tokio::spawn(async move {
                    let action = envelope.message.action();
                    let response = handler.handle(envelope.message).await;
                    if let Some(reply) = envelope.reply {
                        if reply.send(response).is_err() {
                            debug!(
                                context = %context,
                                action,
                                "MessageBus: sender went away before reply"
                            );
                        }
                    }
                });
            }
        });

        debug!(context = %context, "MessageBus: context loaded");
        Listener {
            bus: self.clone(),
            context,
            sender: tx,
            task,
        }
    }

    pub async fn is_loaded(&self, context: ContextId) -> bool {
        self.contexts
            .read()
            .await
            .get(&context)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Send a request and wait for exactly one outcome
    pub async fn send(&self, to: ContextId, message: Message) -> Delivery {
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            reply: Some(reply_tx),
        };
        if !self.enqueue(to, envelope).await {
            return Delivery::NotLoaded;
        }
        match reply_rx.await {
            Ok(Some(response)) => Delivery::Answered(response),
            Ok(None) => Delivery::NoResponse,
            Err(_) => Delivery::NotLoaded,
        }
    }

    /// Fire-and-forget delivery to every context except `from`.
    ///
    /// Returns how many contexts the message was queued for; failures are dropped.
    pub async fn broadcast(&self, from: ContextId, message: Message) -> usize {
        let targets: Vec<ContextId> = {
            let contexts = self.contexts.read().await;
            contexts.keys().copied().filter(|c| *c != from).collect()
        };

        let mut delivered = 0;
        for target in targets {
            let envelope = Envelope {
                message: message.clone(),
                reply: None,
            };
            if self.enqueue(target, envelope).await {
                delivered += 1;
            }
        }
        debug!(action = message.action(), delivered, "MessageBus: broadcast");
        delivered
    }

    /// Liveness probe: true only when the context answers with a pong
    pub async fn ping(&self, to: ContextId) -> bool {
        matches!(
            self.send(to, Message::Ping).await,
            Delivery::Answered(Response::Pong { loaded: true, .. })
        )
    }

    async fn enqueue(&self, to: ContextId, envelope: Envelope) -> bool {
        let sender = self.contexts.read().await.get(&to).cloned();
        let Some(sender) = sender else {
            return false;
        };
        if sender.send(envelope).is_err() {
            warn!(context = %to, "MessageBus: context stopped listening, unregistering");
            self.contexts.write().await.remove(&to);
            return false;
        }
        true
    }

    /// Remove `context` unless it has since been re-registered with another listener
    async fn unregister(&self, context: ContextId, sender: &mpsc::UnboundedSender<Envelope>) {
        let mut contexts = self.contexts.write().await;
        if contexts
            .get(&context)
            .map(|current| current.same_channel(sender))
            .unwrap_or(false)
        {
            contexts.remove(&context);
        }
    }
}

/// Handle to a registered context. Dropping it stops the receive loop.
pub struct Listener {
    bus: MessageBus,
    context: ContextId,
    sender: mpsc::UnboundedSender<Envelope>,
    task: JoinHandle<()>,
}

impl Listener {
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Unload the context: it stops receiving and later requests see `NotLoaded`
    pub async fn unload(self) {
        self.task.abort();
        self.bus.unregister(self.context, &self.sender).await;
        debug!(context = %self.context, "MessageBus: context unloaded");
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
