//! Signal shaping: lenient coercion, normalization, clipboard formatting.

pub mod coerce;
pub mod format;
pub mod normalizer;

pub use format::format_for_clipboard;
pub use normalizer::{normalize, normalize_state, rescale_confidence};
