//! Signal records: the canonical shape consumers see and the raw store record

use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction of a canonical signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Buy,
    Sell,
}

impl Direction {
    /// Map a free-form label onto a direction. Unknown labels are BUY.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "SELL" | "SHORT" => Direction::Sell,
            _ => Direction::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized signal handed to every consumer.
///
/// `confidence` is always on the 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSignal {
    pub pair: String,
    pub direction: Direction,
    pub entry_min: f64,
    pub entry_max: f64,
    pub stop_loss: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp_full: f64,
    pub confidence: f64,
    pub setup: String,
    pub timestamp: String,
}

/// The single record held by the signal store, returned verbatim by `GET /signal`.
///
/// `action` is kept as the producer sent it (uppercased) and `confidence` is not rescaled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    pub pair: String,
    pub action: String,
    pub entry_min: f64,
    pub entry_max: f64,
    pub stop_loss: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub tp_full: f64,
    pub confidence: f64,
    pub setup: String,
    pub timestamp: Option<String>,
}
