//! Unit tests for the single-record signal store

use serde_json::json;
use signalbridge::models::signal::{Direction, StoreState};
use signalbridge::signals::normalize_state;
use signalbridge::store::SignalStore;
use std::sync::Arc;

#[tokio::test]
async fn upsert_then_get_returns_coerced_record() {
    let store = SignalStore::new();
    let returned = store
        .upsert(&json!({
            "pair": "EURUSD",
            "action": "buy",
            "entry_min": "1.1000",
            "entry_max": 1.105,
            "stop_loss": "1.095",
            "tp1": 1.11,
            "tp2": 1.12,
            "tp_full": 1.13,
            "confidence": 0.82,
            "setup": "Breakout"
        }))
        .await;

    let current = store.get().await;
    assert_eq!(current, returned);
    assert_eq!(current.pair, "EURUSD");
    assert_eq!(current.action, "BUY");
    assert_eq!(current.entry_min, 1.1);
    assert_eq!(current.stop_loss, 1.095);
    assert_eq!(current.confidence, 0.82);
    assert_eq!(current.setup, "Breakout");
    assert!(current.timestamp.is_some());
}

#[tokio::test]
async fn unparsable_and_absent_numbers_become_zero() {
    let store = SignalStore::new();
    let state = store
        .upsert(&json!({"pair": "EURUSD", "tp1": "soon", "entry_min": null}))
        .await;
    assert_eq!(state.tp1, 0.0);
    assert_eq!(state.entry_min, 0.0);
    assert_eq!(state.tp_full, 0.0);
}

#[tokio::test]
async fn absent_pair_keeps_previous_value_but_other_fields_reset() {
    let store = SignalStore::new();
    store
        .upsert(&json!({"pair": "EURUSD", "tp1": 1.11, "setup": "Retest"}))
        .await;
    let state = store.upsert(&json!({"stop_loss": 1.09})).await;

    assert_eq!(state.pair, "EURUSD");
    assert_eq!(state.stop_loss, 1.09);
    assert_eq!(state.tp1, 0.0);
    assert_eq!(state.setup, "");
    assert_eq!(state.action, "");
}

#[tokio::test]
async fn reset_restores_zero_record() {
    let store = SignalStore::new();
    store.upsert(&json!({"pair": "EURUSD", "tp1": 1.11})).await;
    store.reset().await;

    let state = store.get().await;
    assert_eq!(state, StoreState::default());
    assert!(state.timestamp.is_none());
}

#[tokio::test]
async fn eurusd_record_normalizes_to_percent_confidence() {
    let store = SignalStore::new();
    store
        .upsert(&json!({
            "pair": "EURUSD",
            "action": "BUY",
            "entry_min": 1.1,
            "entry_max": 1.105,
            "stop_loss": 1.095,
            "tp1": 1.11,
            "tp2": 1.12,
            "tp_full": 1.13,
            "confidence": 0.82
        }))
        .await;

    let state = store.get().await;
    assert_eq!(state.confidence, 0.82);

    let signal = normalize_state(&state);
    assert_eq!(signal.pair, "EURUSD");
    assert_eq!(signal.direction, Direction::Buy);
    assert_eq!(signal.confidence, 82.0);
    assert_eq!(signal.tp_full, 1.13);
}

#[tokio::test]
async fn concurrent_upserts_never_mix_records() {
    let store = Arc::new(SignalStore::new());
    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let price = i as f64;
            store
                .upsert(&json!({"pair": format!("P{}", i), "tp1": price, "tp2": price}))
                .await;
        }));
    }
    for handle in handles {
        handle.await.expect("upsert task");
    }

    let state = store.get().await;
    let i: f64 = state.pair[1..].parse().expect("pair suffix");
    assert_eq!(state.tp1, i);
    assert_eq!(state.tp2, i);
}
