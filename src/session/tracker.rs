//! Per-process allocation tracker built on the callstack trie.
//!
//! Every live allocation retains the node of the stack that made it. Freeing
//! the allocation releases that node, pruning whatever part of the stack no
//! other live allocation shares.

use super::config::SessionConfig;
use crate::location::FrameData;
use crate::trie::{CallstackTrie, NodeRef};
use crate::utils::error::SessionError;
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Running totals for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    /// Allocations whose stack was recorded
    pub recorded: u64,
    /// Frees that released a recorded allocation
    pub freed: u64,
    /// Allocations dropped because the trie was at budget
    pub dropped: u64,
    /// Allocations that reused a live address without an intervening free
    pub replaced: u64,
}

/// Live allocation totals for one retained call stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallsiteTotals {
    pub node: NodeRef,
    pub live_allocations: u64,
    pub live_bytes: u64,
}

#[derive(Debug, Clone, Copy)]
struct LiveAllocation {
    node: NodeRef,
    size: u64,
}

/// Allocation tracker for one monitored process
///
/// **Public** - owns one `CallstackTrie`; sessions never share tries
#[derive(Debug)]
pub struct ProfilingSession {
    config: SessionConfig,
    trie: CallstackTrie,
    allocations: FxHashMap<u64, LiveAllocation>,
    counters: SessionCounters,
}

impl Default for ProfilingSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl ProfilingSession {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_trie(config, CallstackTrie::new())
    }

    /// Create a session around an existing (normally empty) trie
    pub fn with_trie(config: SessionConfig, trie: CallstackTrie) -> Self {
        Self {
            config,
            trie,
            allocations: FxHashMap::default(),
            counters: SessionCounters::default(),
        }
    }

    /// Record a sampled allocation and retain its call stack
    ///
    /// **Public** - main entry point for allocation samples
    ///
    /// # Arguments
    /// * `address` - Address of the allocation
    /// * `size` - Size in bytes
    /// * `frames` - Unwound frames, leaf-first
    /// * `build_ids` - One build id per frame
    ///
    /// # Returns
    /// The retained node, or None if the sample was dropped for budget
    ///
    /// # Errors
    /// * `SessionError::Trie` - frame/build id length mismatch
    pub fn record_allocation<S: AsRef<str>>(
        &mut self,
        address: u64,
        size: u64,
        frames: &[FrameData],
        build_ids: &[S],
    ) -> Result<Option<NodeRef>, SessionError> {
        // A live address means we missed its free.
        if let Some(previous) = self.allocations.remove(&address) {
            self.trie.decrement_node(previous.node)?;
            self.counters.replaced += 1;
        }

        if self.config.at_budget(self.trie.node_count()) {
            self.counters.dropped += 1;
            warn!(
                "Trie at budget ({} nodes), dropping allocation at {:#x}",
                self.trie.node_count(),
                address
            );
            return Ok(None);
        }

        let node = self.trie.create_callsite(frames, build_ids)?;
        self.trie.increment_node(node)?;
        self.allocations.insert(address, LiveAllocation { node, size });
        self.counters.recorded += 1;

        Ok(Some(node))
    }

    /// Release the allocation at `address`
    ///
    /// # Returns
    /// `true` if a recorded allocation was released, `false` if the address
    /// was not tracked (never sampled, dropped, or already freed)
    pub fn record_free(&mut self, address: u64) -> Result<bool, SessionError> {
        let Some(allocation) = self.allocations.remove(&address) else {
            return Ok(false);
        };

        self.trie.decrement_node(allocation.node)?;
        self.counters.freed += 1;
        Ok(true)
    }

    /// Live allocation totals per retained stack, largest first
    pub fn callsite_totals(&self) -> Vec<CallsiteTotals> {
        let mut by_node: FxHashMap<NodeRef, CallsiteTotals> = FxHashMap::default();
        for allocation in self.allocations.values() {
            let totals = by_node.entry(allocation.node).or_insert(CallsiteTotals {
                node: allocation.node,
                live_allocations: 0,
                live_bytes: 0,
            });
            totals.live_allocations += 1;
            totals.live_bytes = totals.live_bytes.saturating_add(allocation.size);
        }

        let mut totals: Vec<CallsiteTotals> = by_node.into_values().collect();
        totals.sort_by(|a, b| {
            b.live_bytes
                .cmp(&a.live_bytes)
                .then(a.node.id().cmp(&b.node.id()))
        });
        totals
    }

    /// Release every stack still held, leaving only the trie root
    ///
    /// # Returns
    /// Number of allocations released
    pub fn teardown(&mut self) -> Result<usize, SessionError> {
        let released = self.allocations.len();
        // Every allocation is released even if one fails; the first error wins.
        let mut first_error = None;
        for (_, allocation) in self.allocations.drain() {
            if let Err(e) = self.trie.decrement_node(allocation.node) {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e.into());
        }

        debug!(
            "Session teardown released {} allocations, {} nodes remain",
            released,
            self.trie.node_count()
        );
        Ok(released)
    }

    /// Number of allocations currently retained
    pub fn live_allocations(&self) -> usize {
        self.allocations.len()
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn trie(&self) -> &CallstackTrie {
        &self.trie
    }
}
