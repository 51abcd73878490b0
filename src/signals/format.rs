//! Plain-text clipboard rendering of a canonical signal

use crate::models::signal::CanonicalSignal;
use chrono::{DateTime, Local};

const RULE: &str = "═══════════════════════════════════════";

/// Render a timestamp in local time, falling back to the raw text
pub fn localize_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Confidence as an integer percentage, halves rounded away from zero
pub fn confidence_percent(confidence: f64) -> String {
    format!("{:.0}%", confidence.round())
}

/// Fixed multi-section block used by every copy action.
///
/// Take-profit labels carry the 50/30/20 position split.
pub fn format_for_clipboard(signal: &CanonicalSignal) -> String {
    let mut text = format!("{RULE}\nTRADING SIGNAL\n{RULE}\n\n");

    text.push_str(&format!("Pair: {}\n", signal.pair));
    text.push_str(&format!("Direction: {}\n\n", signal.direction));

    text.push_str("Entry Zone:\n");
    text.push_str(&format!("   Min: {}\n", signal.entry_min));
    text.push_str(&format!("   Max: {}\n\n", signal.entry_max));

    text.push_str(&format!("Stop Loss: {}\n\n", signal.stop_loss));

    text.push_str("Take Profit Levels:\n");
    text.push_str(&format!("   TP1 (50%): {}\n", signal.tp1));
    text.push_str(&format!("   TP2 (30%): {}\n", signal.tp2));
    text.push_str(&format!("   Full TP (20%): {}\n\n", signal.tp_full));

    text.push_str(&format!(
        "Confidence: {}\n\n",
        confidence_percent(signal.confidence)
    ));

    if !signal.setup.is_empty() {
        text.push_str(&format!("Setup:\n{}\n\n", signal.setup));
    }

    if !signal.timestamp.is_empty() {
        text.push_str(&format!(
            "Timestamp: {}\n",
            localize_timestamp(&signal.timestamp)
        ));
    }

    text.push_str(&format!("\n{RULE}\nGenerated by signalbridge\n{RULE}"));
    text
}
