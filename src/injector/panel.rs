//! Confirmation panel and the clipboard fallback channel.
//!
//! The panel is shown on every injection, whatever happens to the field
//! writes, so a human can always copy the signal by hand.

use crate::models::signal::CanonicalSignal;
use crate::signals::format::{confidence_percent, format_for_clipboard, localize_timestamp};
use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

pub const PANEL_ID: &str = "signalbridge-signal-panel";

pub const COPY_FAILED_NOTICE: &str = "Failed to copy. Please try again.";

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("{notice} (clipboard: {primary}; selection copy: {fallback})")]
    Exhausted {
        notice: &'static str,
        primary: String,
        fallback: String,
    },
}

/// Two ways to reach the system clipboard: the async clipboard API and the
/// legacy hidden-selection copy.
#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;

    fn copy_via_selection(&self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyChannel {
    Clipboard,
    Selection,
}

/// Try the clipboard API, then the selection copy, then give up with a user notice
pub async fn copy_with_fallback(
    clipboard: &dyn Clipboard,
    text: &str,
) -> Result<CopyChannel, ClipboardError> {
    let primary = match clipboard.write_text(text).await {
        Ok(()) => return Ok(CopyChannel::Clipboard),
        Err(e) => e,
    };
    warn!(error = %primary, "Clipboard write failed, trying selection copy");

    match clipboard.copy_via_selection(text) {
        Ok(()) => Ok(CopyChannel::Selection),
        Err(fallback) => Err(ClipboardError::Exhausted {
            notice: COPY_FAILED_NOTICE,
            primary: primary.to_string(),
            fallback: fallback.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationPanel {
    signal: CanonicalSignal,
}

impl ConfirmationPanel {
    pub fn new(signal: CanonicalSignal) -> Self {
        Self { signal }
    }

    pub fn signal(&self) -> &CanonicalSignal {
        &self.signal
    }

    /// Plain rendering of every field plus the copy action
    pub fn render(&self) -> String {
        let s = &self.signal;
        let mut lines = vec![
            "LIVE Signal".to_string(),
            format!("{} {}", s.direction, s.pair),
            format!("Entry Min: {} | Entry Max: {}", s.entry_min, s.entry_max),
            format!("Stop Loss: {} | TP1: {} | Full TP: {}", s.stop_loss, s.tp1, s.tp_full),
            format!("TP2: {} | Confidence: {}", s.tp2, confidence_percent(s.confidence)),
        ];
        if !s.setup.is_empty() {
            lines.push(format!("Setup: {}", s.setup));
        }
        lines.push(if s.timestamp.is_empty() {
            "Just now".to_string()
        } else {
            localize_timestamp(&s.timestamp)
        });
        lines.push("[Copy Signal Details]".to_string());
        lines.push(
            "Double-click the indicator, then enter the values in its LIVE inputs".to_string(),
        );
        lines.join("\n")
    }

    pub fn clipboard_text(&self) -> String {
        format_for_clipboard(&self.signal)
    }

    /// The panel's copy action
    pub async fn copy(&self, clipboard: &dyn Clipboard) -> Result<CopyChannel, ClipboardError> {
        let channel = copy_with_fallback(clipboard, &self.clipboard_text()).await?;
        info!(pair = %self.signal.pair, channel = ?channel, "Signal details copied");
        Ok(channel)
    }
}

/// In-process clipboard with switchable failures
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    primary_fails: bool,
    selection_fails: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failures(primary_fails: bool, selection_fails: bool) -> Self {
        Self {
            primary_fails,
            selection_fails,
            ..Default::default()
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn store(&self, text: &str) {
        *self
            .contents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(text.to_string());
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.primary_fails {
            return Err(ClipboardError::Unavailable("permission denied".to_string()));
        }
        self.store(text);
        Ok(())
    }

    fn copy_via_selection(&self, text: &str) -> Result<(), ClipboardError> {
        if self.selection_fails {
            return Err(ClipboardError::Unavailable("selection copy rejected".to_string()));
        }
        self.store(text);
        Ok(())
    }
}
