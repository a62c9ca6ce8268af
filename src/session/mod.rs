//! Profiling sessions: allocation samples retaining and releasing stacks.
//!
//! This module handles:
//! - Mapping live allocation addresses to retained callstack nodes
//! - Releasing stacks on free and at session teardown
//! - Optional node budget for dropping samples under pressure

pub mod config;
pub mod tracker;

// Re-export main types
pub use config::SessionConfig;
pub use tracker::{CallsiteTotals, ProfilingSession, SessionCounters};
