//! Trie nodes and the handles that name them.

use crate::interner::Interned;
use crate::location::Frame;
use rustc_hash::FxHashMap;
use std::fmt;

/// Handle to one node of a `CallstackTrie`
///
/// **Public** - identifies a call stack
///
/// Pairs the node's arena slot with its id. Ids are assigned monotonically
/// and never reused, so a handle to a pruned node is detected even after its
/// slot has been recycled, and an id seen by a consumer stays unambiguous.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub(crate) slot: u32,
    pub(crate) id: u64,
}

impl NodeRef {
    /// Stable callstack id of the node
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({}@{})", self.id, self.slot)
    }
}

/// One distinct call-stack prefix ending at `location`
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) id: u64,
    /// Slot of the parent; None only for the root
    pub(crate) parent: Option<u32>,
    /// Frame this node adds to its parent's stack; owns one frame reference
    pub(crate) location: Interned<Frame>,
    /// Children keyed by frame identity
    pub(crate) children: FxHashMap<Interned<Frame>, u32>,
    /// Number of retained stacks whose path passes through this node
    pub(crate) ref_count: u64,
}

impl Node {
    pub(crate) fn new(id: u64, parent: Option<u32>, location: Interned<Frame>) -> Self {
        Self {
            id,
            parent,
            location,
            children: FxHashMap::default(),
            ref_count: 0,
        }
    }

    pub(crate) fn handle(&self, slot: u32) -> NodeRef {
        NodeRef { slot, id: self.id }
    }
}
