//! Canonical, interned code locations.

use crate::interner::Interned;

/// One loaded code region (binary or library)
///
/// **Public** - stored in the mapping interner
///
/// Equality is structural over every field. Because strings are interned,
/// comparing path components is comparing ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mapping {
    pub build_id: Interned<str>,
    pub exact_offset: u64,
    pub start_offset: u64,
    pub start: u64,
    pub end: u64,
    pub load_bias: u64,
    /// Mapping path split on `/`, empty segments dropped
    pub path_components: Vec<Interned<str>>,
}

impl Mapping {
    /// Create a mapping with the given build id and all other fields empty
    pub fn new(build_id: Interned<str>) -> Self {
        Self {
            build_id,
            exact_offset: 0,
            start_offset: 0,
            start: 0,
            end: 0,
            load_bias: 0,
            path_components: Vec::new(),
        }
    }
}

/// One stack frame: a mapping, a function name and an offset
///
/// **Public** - stored in the frame interner, keys trie children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    pub mapping: Interned<Mapping>,
    pub function_name: Interned<str>,
    pub rel_pc: u64,
}

impl Frame {
    pub fn new(mapping: Interned<Mapping>, function_name: Interned<str>, rel_pc: u64) -> Self {
        Self {
            mapping,
            function_name,
            rel_pc,
        }
    }
}
