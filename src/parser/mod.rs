//! Replay input parsing.
//!
//! This module handles:
//! - Parsing JSON event logs of allocation/free samples
//! - Normalizing per-frame build ids

pub mod events;

// Re-export main types
pub use events::{parse_events, read_events, EventLog, SampleEvent};
