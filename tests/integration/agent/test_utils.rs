//! Test utilities for polling agent integration tests

use async_trait::async_trait;
use serde_json::Value;
use signalbridge::agent::PollingAgent;
use signalbridge::bus::{Message, MessageBus, MessageHandler, Response};
use signalbridge::config::AgentConfig;
use signalbridge::metrics::Metrics;
use signalbridge::models::signal::CanonicalSignal;
use signalbridge::storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Agent wired to a mocked signal API and in-memory storage
#[allow(dead_code)]
pub struct TestAgent {
    pub agent: PollingAgent,
    pub bus: MessageBus,
    pub storage: Arc<MemoryStore>,
    pub metrics: Arc<Metrics>,
    pub api: MockServer,
}

impl TestAgent {
    pub async fn new() -> Self {
        let api = MockServer::start().await;
        let storage = Arc::new(MemoryStore::new());
        let bus = MessageBus::new();
        let metrics = Arc::new(Metrics::new().expect("metrics initialization"));

        let config = AgentConfig {
            api_url: format!("{}/signal", api.uri()),
            poll_interval_seconds: 60,
            auto_fetch: true,
        };
        let agent = PollingAgent::new(storage.clone(), bus.clone(), config)
            .with_metrics(metrics.clone());

        Self {
            agent,
            bus,
            storage,
            metrics,
            api,
        }
    }
}

pub async fn mock_signal(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/signal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Like [`mock_signal`], answering only after `delay`
pub async fn mock_signal_delayed(server: &MockServer, body: Value, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/signal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body).set_delay(delay))
        .mount(server)
        .await;
}

pub async fn mock_status(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/signal"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Consumer context that records broadcast signals
#[derive(Default)]
pub struct RecordingConsumer {
    pub received: Mutex<Vec<CanonicalSignal>>,
}

#[async_trait]
impl MessageHandler for RecordingConsumer {
    async fn handle(&self, message: Message) -> Option<Response> {
        match message {
            Message::Ping => Some(Response::pong()),
            Message::SignalUpdated { signal } => {
                self.received.lock().await.push(signal);
                None
            }
            _ => None,
        }
    }
}
