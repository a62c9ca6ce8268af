//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod replay;
pub mod utils;

// Re-export main command functions
pub use replay::{execute_replay, replay_events, validate_args, ReplayArgs, ReplaySummary};
pub use utils::{display_version, validate_dump_file};
