//! Unit tests for signal normalization

use serde_json::{json, Value};
use signalbridge::models::signal::{CanonicalSignal, Direction, StoreState};
use signalbridge::signals::{normalize, normalize_state};

fn renormalize(signal: &CanonicalSignal) -> CanonicalSignal {
    let raw: Value = serde_json::to_value(signal).expect("serialize canonical signal");
    normalize(&raw)
}

#[test]
fn fractional_confidence_is_scaled_to_percent() {
    for v in [0.01, 0.25, 0.82, 1.0] {
        let signal = normalize(&json!({ "confidence": v }));
        assert!(
            (signal.confidence - v * 100.0).abs() < 1e-9,
            "confidence {} became {}",
            v,
            signal.confidence
        );
    }
}

#[test]
fn zero_and_percent_confidence_pass_through() {
    for v in [0.0, 1.01, 50.0, 82.0, 100.0] {
        assert_eq!(normalize(&json!({ "confidence": v })).confidence, v);
    }
}

#[test]
fn conf_alias_and_string_values_are_accepted() {
    assert_eq!(normalize(&json!({ "conf": "0.75" })).confidence, 75.0);
    assert_eq!(normalize(&json!({ "confidence": "n/a" })).confidence, 0.0);
}

#[test]
fn normalization_is_idempotent_on_canonical_records() {
    let inputs = [
        json!({"pair": "EURUSD", "action": "buy", "entry_min": 1.1, "entry_max": 1.105,
               "stop_loss": 1.095, "tp1": 1.11, "tp2": 1.12, "tp_full": 1.13,
               "confidence": 0.82, "setup": "Retest", "timestamp": "2024-05-01T10:00:00.000Z"}),
        json!({"symbol": "GBPJPY", "side": "SHORT", "entry": "190.5", "sl": "191",
               "takeProfit": 188, "conf": 64, "timestamp": "2024-05-01T10:00:00Z"}),
        json!({"timestamp": "2024-05-01T10:00:00Z"}),
    ];

    for input in inputs {
        let once = normalize(&input);
        assert_eq!(renormalize(&once), once);
    }
}

#[test]
fn unknown_direction_labels_default_to_buy() {
    assert_eq!(normalize(&json!({"direction": "sideways"})).direction, Direction::Buy);
    assert_eq!(normalize(&json!({"direction": "short"})).direction, Direction::Sell);
}

#[test]
fn falsy_alias_values_fall_through_to_the_next_alias() {
    let signal = normalize(&json!({"pair": "", "symbol": "USDJPY", "tp_full": 0, "tp3": 151.2}));
    assert_eq!(signal.pair, "USDJPY");
    assert_eq!(signal.tp_full, 151.2);
}

#[test]
fn store_record_normalizes_like_a_polled_body() {
    let state = StoreState {
        pair: "EURUSD".to_string(),
        action: "SELL".to_string(),
        confidence: 0.6,
        timestamp: Some("2024-05-01T10:00:00.000Z".to_string()),
        ..StoreState::default()
    };
    let signal = normalize_state(&state);
    assert_eq!(signal.pair, "EURUSD");
    assert_eq!(signal.direction, Direction::Sell);
    assert_eq!(signal.confidence, 60.0);
    assert_eq!(signal.timestamp, "2024-05-01T10:00:00.000Z");
}

#[test]
fn zero_store_record_normalizes_to_defaults() {
    let signal = normalize_state(&StoreState::default());
    assert_eq!(signal.pair, "UNKNOWN");
    assert_eq!(signal.direction, Direction::Buy);
    assert!(!signal.timestamp.is_empty());
}
