//! Output for the serialization side.
//!
//! This module handles:
//! - Building id-keyed dumps of retained call stacks
//! - Writing and reading dumps as JSON

pub mod dump;
pub mod json;
pub mod schema;

// Re-export main functions
pub use dump::{build_dump, validate_dump};
pub use json::{dump_to_string, read_dump, write_dump};
pub use schema::CallstackDump;
