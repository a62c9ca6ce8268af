//! Reference-counted trie over interned frames.
//!
//! Each root-to-node path spells one call stack read root-first (outermost
//! caller first). Stacks that share callers share the nodes for them.
//!
//! Nodes live in an arena; parents are slot indices. A node's count is the
//! number of retained stacks passing through it. `decrement_node` prunes the
//! maximal leaf-ward run of nodes whose count drops to zero and leaves the
//! first still-referenced ancestor, and everything above it, alone.

use super::node::{Node, NodeRef};
use crate::interner::Interned;
use crate::location::{CodeLocationInterner, Frame, FrameData, InternerStats, ResolvedFrame};
use crate::utils::config::{INITIAL_NODE_CAP, ROOT_NODE_ID};
use crate::utils::error::{InternError, TrieError};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

const ROOT_SLOT: u32 = 0;

/// Size figures a producer can base capacity decisions on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieStats {
    /// Live nodes, root excluded
    pub live_nodes: usize,
    /// Highest callstack id handed out so far
    pub last_callstack_id: u64,
    pub interners: InternerStats,
}

/// Deduplicating store of call stacks
///
/// **Public** - one instance per profiling session
///
/// Not synchronized: callers sharing an instance across threads must
/// serialize every mutating call themselves.
#[derive(Debug, Clone)]
pub struct CallstackTrie {
    nodes: Vec<Option<Node>>,
    free_slots: Vec<u32>,
    next_callstack_id: u64,
    locations: CodeLocationInterner,
}

impl Default for CallstackTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl CallstackTrie {
    /// Create an empty trie with fresh interners
    pub fn new() -> Self {
        Self::with_locations(CodeLocationInterner::new())
    }

    /// Create an empty trie on top of the given interners
    ///
    /// **Public** - lets callers construct isolated or pre-seeded sessions
    pub fn with_locations(mut locations: CodeLocationInterner) -> Self {
        let root_frame = locations.make_root_frame();
        let mut nodes = Vec::with_capacity(INITIAL_NODE_CAP);
        nodes.push(Some(Node::new(ROOT_NODE_ID, None, root_frame)));

        Self {
            nodes,
            free_slots: Vec::new(),
            next_callstack_id: ROOT_NODE_ID,
            locations,
        }
    }

    /// The sentinel ancestor of every call stack
    pub fn root(&self) -> NodeRef {
        NodeRef {
            slot: ROOT_SLOT,
            id: ROOT_NODE_ID,
        }
    }

    /// Record a call stack delivered by the unwinder
    ///
    /// **Public** - main entry point for raw samples
    ///
    /// # Arguments
    /// * `callstack` - Frames leaf-first (innermost frame first)
    /// * `build_ids` - One build id per frame, same order
    ///
    /// # Returns
    /// The node for the innermost frame. For an empty stack, the root.
    ///
    /// # Errors
    /// * `TrieError::LengthMismatch` - frame and build id counts differ
    pub fn create_callsite<S: AsRef<str>>(
        &mut self,
        callstack: &[FrameData],
        build_ids: &[S],
    ) -> Result<NodeRef, TrieError> {
        if callstack.len() != build_ids.len() {
            return Err(TrieError::LengthMismatch {
                frames: callstack.len(),
                build_ids: build_ids.len(),
            });
        }

        let created_before = self.next_callstack_id;
        let mut node = self.root();

        // The unwinder gives frames leaf-first; the trie is keyed root-first.
        for (loc, build_id) in callstack.iter().rev().zip(build_ids.iter().rev()) {
            let frame = self.locations.intern_code_location(loc, build_id.as_ref());
            let child = self.get_or_create_child(node, frame);
            // Drop the reference taken by interning; the child node holds its own.
            self.locations.release_frame(frame)?;
            node = child?;
        }

        self.log_created(created_before, callstack.len());
        Ok(node)
    }

    /// Record a call stack of already-interned frames, leaf-first
    ///
    /// The caller keeps the references it holds on `callstack`.
    ///
    /// # Errors
    /// * `TrieError::Intern` - a frame handle was already released
    pub fn create_callsite_from_frames(
        &mut self,
        callstack: &[Interned<Frame>],
    ) -> Result<NodeRef, TrieError> {
        let created_before = self.next_callstack_id;
        let mut node = self.root();

        for frame in callstack.iter().rev() {
            node = self.get_or_create_child(node, *frame)?;
        }

        self.log_created(created_before, callstack.len());
        Ok(node)
    }

    /// Find the child of `node` for `frame`, creating it if absent
    ///
    /// **Public** - one step of callsite construction
    ///
    /// A new child gets the next callstack id and takes its own reference on
    /// `frame`. Value-equal frames intern to the same handle, so this is
    /// idempotent for them.
    pub fn get_or_create_child(
        &mut self,
        node: NodeRef,
        frame: Interned<Frame>,
    ) -> Result<NodeRef, TrieError> {
        if let Some(&slot) = self.node(node)?.children.get(&frame) {
            let child = self.slot_ref(slot, node)?;
            return Ok(child.handle(slot));
        }

        self.locations.retain_frame(frame)?;

        self.next_callstack_id += 1;
        let child = Node::new(self.next_callstack_id, Some(node.slot), frame);
        let handle = self.insert_node(child);

        self.slot_mut(node.slot, node)?
            .children
            .insert(frame, handle.slot);

        trace!("Created node {} under {}", handle.id, node.id);
        Ok(handle)
    }

    /// Mark `node` and its whole prefix path as used by one more stack
    ///
    /// **Public** - call once per retained stack, after `create_callsite`
    pub fn increment_node(&mut self, node: NodeRef) -> Result<(), TrieError> {
        self.node(node)?;

        let mut current = Some(node.slot);
        while let Some(slot) = current {
            let entry = self.slot_mut(slot, node)?;
            entry.ref_count += 1;
            current = entry.parent;
        }
        Ok(())
    }

    /// Release one stack retained through `node`
    ///
    /// **Public** - counterpart of `increment_node`
    ///
    /// Walks leaf to root decrementing every count. A node whose count hits
    /// zero is struck from its parent's children one step later, when the
    /// walk is standing on that parent. The walk therefore prunes exactly the
    /// contiguous run of newly unreferenced nodes above the leaf. The root is
    /// never pruned.
    ///
    /// # Errors
    /// * `TrieError::UnknownNode` - `node` was already pruned
    /// * `TrieError::RefcountUnderflow` - `node` is not retained
    pub fn decrement_node(&mut self, node: NodeRef) -> Result<(), TrieError> {
        if self.node(node)?.ref_count == 0 {
            return Err(TrieError::RefcountUnderflow(node.id));
        }

        let mut current = Some(node.slot);
        let mut dead_child: Option<u32> = None;
        let mut pruned = 0usize;

        while let Some(slot) = current {
            if let Some(dead_slot) = dead_child.take() {
                self.prune(dead_slot, slot, node)?;
                pruned += 1;
            }

            let entry = self.slot_mut(slot, node)?;
            entry.ref_count = entry
                .ref_count
                .checked_sub(1)
                .ok_or(TrieError::RefcountUnderflow(entry.id))?;

            if entry.ref_count == 0 && entry.parent.is_some() {
                dead_child = Some(slot);
            }
            current = entry.parent;
        }

        if pruned > 0 {
            debug!("Released node {}, pruned {} nodes", node.id, pruned);
        }
        Ok(())
    }

    /// Reconstruct the frames of the stack ending at `node`
    ///
    /// **Public** - used by serialization
    ///
    /// # Returns
    /// Frames leaf-first, root excluded: the order the unwinder produced
    pub fn build_inverse_callstack(&self, node: NodeRef) -> Result<Vec<Interned<Frame>>, TrieError> {
        let mut entry = self.node(node)?;
        let mut frames = Vec::new();

        while let Some(parent) = entry.parent {
            frames.push(entry.location);
            entry = self.slot_ref(parent, node)?;
        }
        Ok(frames)
    }

    /// Like `build_inverse_callstack`, with every frame resolved
    pub fn resolve_callstack(&self, node: NodeRef) -> Result<Vec<ResolvedFrame>, TrieError> {
        self.build_inverse_callstack(node)?
            .into_iter()
            .map(|frame| {
                self.locations
                    .resolve_frame(frame)
                    .ok_or(TrieError::Intern(InternError::StaleHandle { id: frame.id() }))
            })
            .collect()
    }

    pub fn parent(&self, node: NodeRef) -> Result<Option<NodeRef>, TrieError> {
        match self.node(node)?.parent {
            Some(slot) => Ok(Some(self.slot_ref(slot, node)?.handle(slot))),
            None => Ok(None),
        }
    }

    /// Frame the node adds to its parent's stack
    pub fn location(&self, node: NodeRef) -> Result<Interned<Frame>, TrieError> {
        Ok(self.node(node)?.location)
    }

    pub fn ref_count(&self, node: NodeRef) -> Result<u64, TrieError> {
        Ok(self.node(node)?.ref_count)
    }

    /// Existing child of `node` for `frame`, without creating one
    pub fn child(&self, node: NodeRef, frame: Interned<Frame>) -> Result<Option<NodeRef>, TrieError> {
        match self.node(node)?.children.get(&frame) {
            Some(&slot) => Ok(Some(self.slot_ref(slot, node)?.handle(slot))),
            None => Ok(None),
        }
    }

    pub fn child_count(&self, node: NodeRef) -> Result<usize, TrieError> {
        Ok(self.node(node)?.children.len())
    }

    /// Whether `node` still names a live node of this trie
    pub fn contains(&self, node: NodeRef) -> bool {
        self.node(node).is_ok()
    }

    /// Number of live nodes, root excluded
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_slots.len() - 1
    }

    pub fn stats(&self) -> TrieStats {
        TrieStats {
            live_nodes: self.node_count(),
            last_callstack_id: self.next_callstack_id,
            interners: self.locations.stats(),
        }
    }

    pub fn locations(&self) -> &CodeLocationInterner {
        &self.locations
    }

    /// Mutable access to the interners, for callers building frames
    /// themselves. Frames referenced by nodes must not be released here.
    pub fn locations_mut(&mut self) -> &mut CodeLocationInterner {
        &mut self.locations
    }

    fn node(&self, node: NodeRef) -> Result<&Node, TrieError> {
        self.nodes
            .get(node.slot as usize)
            .and_then(Option::as_ref)
            .filter(|entry| entry.id == node.id)
            .ok_or(TrieError::UnknownNode(node.id))
    }

    // Slot lookups along parent/child links. A vacant slot there means the
    // trie is corrupt; it is reported against the handle the walk began at.
    fn slot_ref(&self, slot: u32, origin: NodeRef) -> Result<&Node, TrieError> {
        self.nodes
            .get(slot as usize)
            .and_then(Option::as_ref)
            .ok_or(TrieError::UnknownNode(origin.id))
    }

    fn slot_mut(&mut self, slot: u32, origin: NodeRef) -> Result<&mut Node, TrieError> {
        self.nodes
            .get_mut(slot as usize)
            .and_then(Option::as_mut)
            .ok_or(TrieError::UnknownNode(origin.id))
    }

    fn insert_node(&mut self, node: Node) -> NodeRef {
        let id = node.id;
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = Some(node);
                slot
            }
            None => {
                let slot = u32::try_from(self.nodes.len()).unwrap_or_else(|_| {
                    panic!("callstack trie exhausted {} slots", u32::MAX)
                });
                self.nodes.push(Some(node));
                slot
            }
        };
        NodeRef { slot, id }
    }

    /// Remove the unreferenced node in `dead_slot` from its parent in
    /// `parent_slot`, together with its whole subtree
    ///
    /// Descendants can only be created-but-never-retained nodes (count 0);
    /// each one gives back its slot and its frame reference.
    fn prune(&mut self, dead_slot: u32, parent_slot: u32, origin: NodeRef) -> Result<(), TrieError> {
        let dead = self.nodes[dead_slot as usize]
            .take()
            .ok_or(TrieError::UnknownNode(origin.id))?;
        debug_assert_eq!(dead.parent, Some(parent_slot));

        self.slot_mut(parent_slot, origin)?
            .children
            .remove(&dead.location);

        let dead_id = dead.id;
        let mut pending = vec![(dead_slot, dead)];
        let mut removed = 0usize;
        while let Some((slot, node)) = pending.pop() {
            for &child_slot in node.children.values() {
                let child = self.nodes[child_slot as usize]
                    .take()
                    .ok_or(TrieError::UnknownNode(origin.id))?;
                pending.push((child_slot, child));
            }
            self.free_slots.push(slot);
            self.locations.release_frame(node.location)?;
            removed += 1;
        }

        if removed > 1 {
            debug!("Pruned node {} with {} unretained descendants", dead_id, removed - 1);
        } else {
            trace!("Pruned node {}", dead_id);
        }
        Ok(())
    }

    fn log_created(&self, created_before: u64, depth: usize) {
        let created = self.next_callstack_id - created_before;
        if created > 0 {
            debug!(
                "Callsite of depth {} created {} nodes ({} live)",
                depth,
                created,
                self.node_count()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(function: &str, rel_pc: u64) -> FrameData {
        FrameData::new("/system/lib64/libc.so", function, rel_pc)
    }

    /// Build a stack from root-first function names, returned leaf-first
    fn stack(root_first: &[&str]) -> (Vec<FrameData>, Vec<&'static str>) {
        let frames: Vec<FrameData> = root_first
            .iter()
            .rev()
            .enumerate()
            .map(|(i, name)| frame(name, i as u64))
            .collect();
        let build_ids = vec!["abc"; frames.len()];
        (frames, build_ids)
    }

    #[test]
    fn test_empty_callstack_is_root() {
        let mut trie = CallstackTrie::new();
        let empty: [&str; 0] = [];
        let node = trie.create_callsite(&[], &empty).unwrap();
        assert_eq!(node, trie.root());
        assert_eq!(trie.node_count(), 0);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut trie = CallstackTrie::new();
        let result = trie.create_callsite(&[frame("main", 1)], &["a", "b"]);
        assert_eq!(
            result,
            Err(TrieError::LengthMismatch {
                frames: 1,
                build_ids: 2
            })
        );
        assert_eq!(trie.node_count(), 0);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut trie = CallstackTrie::new();
        let (frames, build_ids) = stack(&["main", "a", "b"]);
        let leaf = trie.create_callsite(&frames, &build_ids).unwrap();
        let mid = trie.parent(leaf).unwrap().unwrap();
        let top = trie.parent(mid).unwrap().unwrap();

        assert_eq!(top.id(), 1);
        assert_eq!(mid.id(), 2);
        assert_eq!(leaf.id(), 3);
        assert_eq!(trie.parent(top).unwrap(), Some(trie.root()));
        assert_eq!(trie.parent(trie.root()).unwrap(), None);
    }

    #[test]
    fn test_get_or_create_child_is_idempotent() {
        let mut trie = CallstackTrie::new();
        let root = trie.root();
        let f = trie.locations_mut().intern_code_location(&frame("main", 1), "abc");

        let a = trie.get_or_create_child(root, f).unwrap();
        let b = trie.get_or_create_child(root, f).unwrap();
        assert_eq!(a, b);
        assert_eq!(trie.child_count(root).unwrap(), 1);
        // One reference from us, one from the node.
        assert_eq!(trie.locations().frames().ref_count(f), Some(2));
    }

    #[test]
    fn test_increment_walks_to_root() {
        let mut trie = CallstackTrie::new();
        let (frames, build_ids) = stack(&["main", "a"]);
        let leaf = trie.create_callsite(&frames, &build_ids).unwrap();
        trie.increment_node(leaf).unwrap();

        let parent = trie.parent(leaf).unwrap().unwrap();
        assert_eq!(trie.ref_count(leaf).unwrap(), 1);
        assert_eq!(trie.ref_count(parent).unwrap(), 1);
        assert_eq!(trie.ref_count(trie.root()).unwrap(), 1);
    }

    #[test]
    fn test_decrement_unretained_node_fails() {
        let mut trie = CallstackTrie::new();
        let (frames, build_ids) = stack(&["main"]);
        let leaf = trie.create_callsite(&frames, &build_ids).unwrap();

        assert_eq!(
            trie.decrement_node(leaf),
            Err(TrieError::RefcountUnderflow(leaf.id()))
        );
    }

    #[test]
    fn test_double_release_is_detected() {
        let mut trie = CallstackTrie::new();
        let (frames, build_ids) = stack(&["main", "a"]);
        let leaf = trie.create_callsite(&frames, &build_ids).unwrap();
        trie.increment_node(leaf).unwrap();
        trie.decrement_node(leaf).unwrap();

        assert_eq!(trie.decrement_node(leaf), Err(TrieError::UnknownNode(leaf.id())));
    }

    #[test]
    fn test_pruned_frames_are_released() {
        let mut trie = CallstackTrie::new();
        let baseline = trie.stats().interners;
        let (frames, build_ids) = stack(&["main", "a", "b"]);
        let leaf = trie.create_callsite(&frames, &build_ids).unwrap();
        trie.increment_node(leaf).unwrap();
        assert_eq!(trie.stats().interners.frames, baseline.frames + 3);

        trie.decrement_node(leaf).unwrap();
        let after = trie.stats().interners;
        assert_eq!(after.frames, baseline.frames);
        assert_eq!(after.mappings, baseline.mappings);
    }

    #[test]
    fn test_slot_reuse_keeps_ids_fresh() {
        let mut trie = CallstackTrie::new();
        let (frames, build_ids) = stack(&["main"]);
        let first = trie.create_callsite(&frames, &build_ids).unwrap();
        trie.increment_node(first).unwrap();
        trie.decrement_node(first).unwrap();

        let second = trie.create_callsite(&frames, &build_ids).unwrap();
        assert_ne!(first, second);
        assert!(second.id() > first.id());
        assert!(!trie.contains(first));
        assert!(trie.contains(second));
    }

    #[test]
    fn test_create_from_interned_frames() {
        let mut trie = CallstackTrie::new();
        let leaf_frame = trie.locations_mut().intern_code_location(&frame("leaf", 2), "abc");
        let root_frame = trie.locations_mut().intern_code_location(&frame("main", 1), "abc");

        let node = trie
            .create_callsite_from_frames(&[leaf_frame, root_frame])
            .unwrap();
        assert_eq!(
            trie.build_inverse_callstack(node).unwrap(),
            vec![leaf_frame, root_frame]
        );
    }
}
