//! callstack-trie
//!
//! Call-stack deduplication for heap profilers. Every sampled allocation
//! needs the full stack that produced it; storing that text per sample is
//! far too expensive. Instead:
//!
//! - frames, mappings and strings are hash-consed into interned handles
//! - stacks are paths in a refcounted trie, so shared callers are shared
//!   nodes and a sample only keeps one node handle
//! - releasing a sample prunes exactly the part of its path nobody else uses
//!
//! ```
//! use callstack_trie::{CallstackTrie, FrameData};
//!
//! let mut trie = CallstackTrie::new();
//! let frames = vec![
//!     FrameData::new("/system/lib64/libc.so", "malloc", 0x40),
//!     FrameData::new("/system/bin/app", "main", 0x10),
//! ];
//! let leaf = trie.create_callsite(&frames, &["libc-id", "app-id"]).unwrap();
//! trie.increment_node(leaf).unwrap();
//! assert_eq!(trie.node_count(), 2);
//!
//! trie.decrement_node(leaf).unwrap();
//! assert_eq!(trie.node_count(), 0);
//! ```

pub mod commands;
pub mod interner;
pub mod location;
pub mod output;
pub mod parser;
pub mod session;
pub mod trie;
pub mod utils;

pub use interner::{Interned, Interner, StringInterner};
pub use location::{CodeLocationInterner, Frame, FrameData, Mapping};
pub use session::{ProfilingSession, SessionConfig};
pub use trie::{CallstackTrie, NodeRef, TrieStats};
