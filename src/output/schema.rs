//! Output JSON schema for callstack dumps.
//!
//! Everything is keyed by interned id, so a stack shared by many samples and
//! a string shared by many mappings each appear once. Schema is versioned to
//! allow future evolution.

use crate::session::SessionCounters;
use crate::trie::TrieStats;
use serde::{Deserialize, Serialize};

/// Top-level dump written to JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallstackDump {
    /// Schema version for compatibility checking
    pub version: String,

    /// Timestamp when the dump was generated
    pub generated_at: String,

    /// Trie and interner sizes at dump time
    pub stats: TrieStats,

    /// Session sample counters
    pub counters: SessionCounters,

    pub strings: Vec<StringEntry>,
    pub mappings: Vec<MappingEntry>,
    pub frames: Vec<FrameEntry>,

    /// Retained call stacks
    pub callstacks: Vec<CallstackEntry>,

    /// Live allocation totals per call stack, largest first
    pub allocations: Vec<AllocationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringEntry {
    pub id: u64,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub id: u64,
    pub build_id: u64,
    pub path_components: Vec<u64>,
    pub exact_offset: u64,
    pub start_offset: u64,
    pub start: u64,
    pub end: u64,
    pub load_bias: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub id: u64,
    pub mapping_id: u64,
    pub function_name_id: u64,
    pub rel_pc: u64,
}

/// One call stack, identified by its trie node id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallstackEntry {
    pub id: u64,
    /// Frame ids, innermost frame first
    pub frame_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub callstack_id: u64,
    pub live_allocations: u64,
    pub live_bytes: u64,
}
