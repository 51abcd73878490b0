//! Maps arbitrary upstream payload shapes onto the canonical signal schema

use crate::models::signal::{CanonicalSignal, Direction, StoreState};
use crate::signals::coerce::{as_text, first_truthy, now_iso, parse_float};
use serde_json::Value;

const PAIR: &[&str] = &["pair", "symbol"];
const DIRECTION: &[&str] = &["action", "direction", "side"];
const ENTRY_MIN: &[&str] = &["entry_min", "entryMin", "entry"];
const ENTRY_MAX: &[&str] = &["entry_max", "entryMax", "entry"];
const STOP_LOSS: &[&str] = &["stop_loss", "stopLoss", "sl"];
const TP1: &[&str] = &["tp1", "takeProfit1"];
const TP2: &[&str] = &["tp2", "takeProfit2"];
const TP_FULL: &[&str] = &["tp_full", "tpFull", "tp3", "takeProfit"];
const CONFIDENCE: &[&str] = &["confidence", "conf"];
const SETUP: &[&str] = &["setup", "reason", "description"];
const TIMESTAMP: &[&str] = &["timestamp"];

pub const UNKNOWN_PAIR: &str = "UNKNOWN";

/// Confidence on the 0-1 scale is lifted to 0-100; everything else passes through
pub fn rescale_confidence(confidence: f64) -> f64 {
    if confidence > 0.0 && confidence <= 1.0 {
        confidence * 100.0
    } else {
        confidence
    }
}

fn number(raw: &Value, aliases: &[&str]) -> f64 {
    first_truthy(raw, aliases).map(parse_float).unwrap_or(0.0)
}

fn text(raw: &Value, aliases: &[&str]) -> Option<String> {
    first_truthy(raw, aliases).map(as_text)
}

/// Normalize any payload into a canonical signal. Never fails.
pub fn normalize(raw: &Value) -> CanonicalSignal {
    let direction = text(raw, DIRECTION)
        .map(|label| Direction::from_label(&label))
        .unwrap_or_default();

    CanonicalSignal {
        pair: text(raw, PAIR).unwrap_or_else(|| UNKNOWN_PAIR.to_string()),
        direction,
        entry_min: number(raw, ENTRY_MIN),
        entry_max: number(raw, ENTRY_MAX),
        stop_loss: number(raw, STOP_LOSS),
        tp1: number(raw, TP1),
        tp2: number(raw, TP2),
        tp_full: number(raw, TP_FULL),
        confidence: rescale_confidence(number(raw, CONFIDENCE)),
        setup: text(raw, SETUP).unwrap_or_default(),
        timestamp: text(raw, TIMESTAMP).unwrap_or_else(now_iso),
    }
}

/// Normalize the store's record as a consumer fetching `GET /signal` would
pub fn normalize_state(state: &StoreState) -> CanonicalSignal {
    match serde_json::to_value(state) {
        Ok(raw) => normalize(&raw),
        Err(_) => normalize(&Value::Null),
    }
}
