//! Shared data models spanning the relay layers.

pub mod signal;

pub use signal::{CanonicalSignal, Direction, StoreState};
