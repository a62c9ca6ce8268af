//! Code locations: raw unwinder frames and their canonical interned form.
//!
//! This module handles:
//! - The raw frame record consumed from the unwinder
//! - `Mapping` / `Frame` value types
//! - Interning raw frames into deduplicated `Frame` handles

pub mod adapter;
pub mod frame_data;
pub mod types;

// Re-export main types
pub use adapter::{CodeLocationInterner, InternerStats, ResolvedFrame};
pub use frame_data::FrameData;
pub use types::{Frame, Mapping};
