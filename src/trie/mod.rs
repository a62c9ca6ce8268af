//! Callstack trie: shared, refcounted storage of call stacks.
//!
//! A sample's full stack is recorded once as a path of nodes; the sample
//! itself only keeps the leaf node's handle and stable id.

pub mod callstack;
pub mod node;

// Re-export main types
pub use callstack::{CallstackTrie, TrieStats};
pub use node::NodeRef;
