//! Single-record signal store behind the HTTP surface.
//!
//! The store accepts anything and coerces it: there is no validation and no
//! rejection path. The whole record sits behind one mutex so an upsert or a
//! reset is never observed half-applied.

use crate::models::signal::StoreState;
use crate::signals::coerce::{as_text, first_truthy, now_iso, parse_float};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct SignalStore {
    state: Mutex<StoreState>,
}

impl SignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record, not normalized
    pub async fn get(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    /// Overwrite the record from an arbitrary partial payload.
    ///
    /// `pair` falls back to the previously stored value; every other absent
    /// field resets (numbers to 0, `setup` to empty, `timestamp` to now).
    pub async fn upsert(&self, partial: &Value) -> StoreState {
        let mut state = self.state.lock().await;

        let action = first_truthy(partial, &["action", "direction"])
            .map(|v| as_text(v).to_uppercase())
            .unwrap_or_default();
        let pair = first_truthy(partial, &["pair"])
            .map(as_text)
            .unwrap_or_else(|| state.pair.clone());
        let field = |name: &str| partial.get(name).map(parse_float).unwrap_or(0.0);

        *state = StoreState {
            pair,
            action,
            entry_min: field("entry_min"),
            entry_max: field("entry_max"),
            stop_loss: field("stop_loss"),
            tp1: field("tp1"),
            tp2: field("tp2"),
            tp_full: field("tp_full"),
            confidence: field("confidence"),
            setup: first_truthy(partial, &["setup"]).map(as_text).unwrap_or_default(),
            timestamp: Some(
                first_truthy(partial, &["timestamp"])
                    .map(as_text)
                    .unwrap_or_else(now_iso),
            ),
        };

        info!(
            pair = %state.pair,
            action = %state.action,
            confidence = state.confidence,
            "SignalStore: new signal received"
        );
        state.clone()
    }

    /// Replace the record with the zero-valued one
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        *state = StoreState::default();
        debug!("SignalStore: signal cleared");
    }
}
