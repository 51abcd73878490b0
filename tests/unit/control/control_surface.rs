//! Unit tests for the control surface

use async_trait::async_trait;
use serde_json::json;
use signalbridge::bus::{ContextId, Message, MessageBus, MessageHandler, Response};
use signalbridge::control::{ControlError, ControlSurface, PageStatus};
use signalbridge::injector::{
    CopyChannel, Element, FieldInjector, HostDocument, InjectorConfig, MemoryClipboard, PageAgent,
    VirtualDocument,
};
use signalbridge::models::signal::{CanonicalSignal, Direction};
use signalbridge::storage::{keys, KeyValueStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_test::{assert_err, assert_ok};

/// Stand-in for the background context
#[derive(Default)]
struct FakeBackground {
    intervals: Mutex<Vec<u64>>,
    fail_fetch: bool,
}

#[async_trait]
impl MessageHandler for FakeBackground {
    async fn handle(&self, message: Message) -> Option<Response> {
        match message {
            Message::FetchNow if self.fail_fetch => Some(Response::failed("HTTP 500")),
            Message::FetchNow => Some(Response::ok()),
            Message::UpdateInterval { interval } => {
                self.intervals.lock().await.push(interval);
                Some(Response::ok())
            }
            _ => None,
        }
    }
}

fn signal() -> CanonicalSignal {
    CanonicalSignal {
        pair: "EURUSD".to_string(),
        direction: Direction::Buy,
        entry_min: 1.1,
        entry_max: 1.105,
        stop_loss: 1.095,
        tp1: 1.11,
        tp2: 1.12,
        tp_full: 1.13,
        confidence: 82.0,
        setup: String::new(),
        timestamp: "2024-05-01T10:00:00.000Z".to_string(),
    }
}

async fn store_with_signal() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .set(keys::LAST_SIGNAL, serde_json::to_value(signal()).unwrap())
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn inject_without_cached_signal_fails() {
    let control = ControlSurface::new(MessageBus::new(), Arc::new(MemoryStore::new()));
    assert!(matches!(control.inject(1).await, Err(ControlError::NoSignal)));
}

#[tokio::test]
async fn inject_requires_page_to_answer_ping() {
    let bus = MessageBus::new();
    let control = ControlSurface::new(bus, store_with_signal().await);

    assert_eq!(control.page_status(4).await, PageStatus::RefreshNeeded);
    let err = control.inject(4).await.unwrap_err();
    assert!(matches!(err, ControlError::PageNotLoaded));
    assert_eq!(err.to_string(), "Page not ready. Please refresh the page.");
}

#[tokio::test]
async fn inject_reaches_a_loaded_page() {
    let bus = MessageBus::new();
    let doc = Arc::new(VirtualDocument::new());
    let dialog = doc.append(
        doc.root(),
        Element::new("div").with_attr("data-name", "indicator-properties-dialog"),
    );
    let row = doc.append(dialog, Element::new("div").with_class("cell"));
    doc.append(row, Element::new("span").with_text("LIVE: Pair"));
    let pair = doc.append(row, Element::new("input").with_attr("type", "text"));

    let config = InjectorConfig {
        settle_delay: Duration::from_millis(1),
        select_open_delay: Duration::from_millis(1),
        ..InjectorConfig::default()
    };
    let page = Arc::new(PageAgent::new(FieldInjector::new(doc.clone(), config)));
    let _listener = bus.listen(ContextId::Page(2), page).await;

    let control = ControlSurface::new(bus, store_with_signal().await);
    assert_eq!(control.page_status(2).await, PageStatus::Ready);
    assert_ok!(control.inject(2).await);
    assert_eq!(doc.value(pair), "EURUSD");
}

#[tokio::test]
async fn fetch_now_without_background_is_unavailable() {
    let control = ControlSurface::new(MessageBus::new(), Arc::new(MemoryStore::new()));
    assert!(matches!(
        control.fetch_now().await,
        Err(ControlError::BackgroundUnavailable)
    ));
}

#[tokio::test]
async fn fetch_now_surfaces_background_error() {
    let bus = MessageBus::new();
    let background = Arc::new(FakeBackground {
        fail_fetch: true,
        ..FakeBackground::default()
    });
    let _b = bus.listen(ContextId::Background, background).await;

    let control = ControlSurface::new(bus, Arc::new(MemoryStore::new()));
    match control.fetch_now().await {
        Err(ControlError::Rejected(reason)) => assert_eq!(reason, "HTTP 500"),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn set_interval_persists_and_notifies_background() {
    let bus = MessageBus::new();
    let background = Arc::new(FakeBackground::default());
    let _b = bus.listen(ContextId::Background, background.clone()).await;

    let store = Arc::new(MemoryStore::new());
    let control = ControlSurface::new(bus, store.clone());
    assert_ok!(control.set_interval(15).await);

    assert_eq!(store.get(keys::REFRESH_INTERVAL).await.unwrap(), Some(json!(15)));
    assert_eq!(*background.intervals.lock().await, vec![15]);
}

#[tokio::test]
async fn copy_signal_uses_clipboard_block() {
    let control = ControlSurface::new(MessageBus::new(), store_with_signal().await);
    let clipboard = MemoryClipboard::new();

    let channel = assert_ok!(control.copy_signal(&clipboard).await);
    assert_eq!(channel, CopyChannel::Clipboard);
    let text = clipboard.contents().expect("clipboard contents");
    assert!(text.contains("Pair: EURUSD"));
    assert!(text.contains("Confidence: 82%"));
}

#[tokio::test]
async fn copy_signal_reports_notice_when_clipboard_is_unusable() {
    let control = ControlSurface::new(MessageBus::new(), store_with_signal().await);
    let clipboard = MemoryClipboard::with_failures(true, true);

    let err = assert_err!(control.copy_signal(&clipboard).await);
    assert!(err.to_string().starts_with("Failed to copy. Please try again."));
}
