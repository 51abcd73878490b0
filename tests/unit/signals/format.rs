//! Unit tests for the clipboard block

use signalbridge::models::signal::{CanonicalSignal, Direction};
use signalbridge::signals::format_for_clipboard;

fn signal(setup: &str, timestamp: &str, confidence: f64) -> CanonicalSignal {
    CanonicalSignal {
        pair: "GBPUSD".to_string(),
        direction: Direction::Sell,
        entry_min: 1.27,
        entry_max: 1.272,
        stop_loss: 1.276,
        tp1: 1.265,
        tp2: 1.26,
        tp_full: 1.25,
        confidence,
        setup: setup.to_string(),
        timestamp: timestamp.to_string(),
    }
}

#[test]
fn block_lists_levels_with_position_split() {
    let text = format_for_clipboard(&signal("", "", 70.0));
    assert!(text.contains("TRADING SIGNAL"));
    assert!(text.contains("Pair: GBPUSD"));
    assert!(text.contains("Direction: SELL"));
    assert!(text.contains("   Min: 1.27"));
    assert!(text.contains("   Max: 1.272"));
    assert!(text.contains("Stop Loss: 1.276"));
    assert!(text.contains("TP1 (50%): 1.265"));
    assert!(text.contains("TP2 (30%): 1.26"));
    assert!(text.contains("Full TP (20%): 1.25"));
    assert!(text.contains("Confidence: 70%"));
}

#[test]
fn optional_sections_are_omitted_when_empty() {
    let text = format_for_clipboard(&signal("", "", 70.0));
    assert!(!text.contains("Setup:"));
    assert!(!text.contains("Timestamp:"));

    let text = format_for_clipboard(&signal("Double top", "yesterday", 70.0));
    assert!(text.contains("Setup:\nDouble top"));
    assert!(text.contains("Timestamp: yesterday"));
}

#[test]
fn confidence_is_rounded_to_whole_percent() {
    assert!(format_for_clipboard(&signal("", "", 82.5)).contains("Confidence: 83%"));
    assert!(format_for_clipboard(&signal("", "", 82.4)).contains("Confidence: 82%"));
}
