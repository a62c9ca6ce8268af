//! Configuration and constants shared across the crate.

/// Current output schema version for callstack dumps
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Separator used to split mapping paths into interned components
pub const PATH_SEPARATOR: char = '/';

/// Id of the trie's root node; every other node id is strictly greater
pub const ROOT_NODE_ID: u64 = 0;

// Initial capacities for the interning tables. Sized for a typical process:
// a few hundred loaded mappings, a few thousand distinct frames.
pub const INITIAL_STRING_CAP: usize = 1024;
pub const INITIAL_MAPPING_CAP: usize = 256;
pub const INITIAL_FRAME_CAP: usize = 4096;
pub const INITIAL_NODE_CAP: usize = 4096;
