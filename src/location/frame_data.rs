//! Raw frame records as delivered by the unwinder.

use serde::{Deserialize, Serialize};

/// One unwound stack frame, before canonicalization
///
/// **Public** - input type consumed from the unwinder
///
/// Field names follow the unwinder's vocabulary. All addresses are absolute
/// except `rel_pc`, which is relative to the mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameData {
    /// Path (or pseudo-name) of the mapping the frame executes in
    #[serde(default)]
    pub map_name: String,

    /// First address of the mapping
    #[serde(default)]
    pub map_start: u64,

    /// One past the last address of the mapping
    #[serde(default)]
    pub map_end: u64,

    /// Load bias of the ELF image backing the mapping
    #[serde(default)]
    pub map_load_bias: u64,

    /// Exact page offset of the mapping in its file
    #[serde(default)]
    pub map_exact_offset: u64,

    /// Offset of the ELF header within the file
    #[serde(default)]
    pub map_elf_start_offset: u64,

    /// Function name, if the unwinder resolved one
    #[serde(default)]
    pub function_name: String,

    /// Program counter relative to the mapping
    pub rel_pc: u64,
}

impl FrameData {
    /// Create a frame record with just a mapping path, function and pc
    ///
    /// **Public** - convenience constructor, the mapping bounds stay zero
    pub fn new(map_name: impl Into<String>, function_name: impl Into<String>, rel_pc: u64) -> Self {
        Self {
            map_name: map_name.into(),
            function_name: function_name.into(),
            rel_pc,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_bounds(mut self, start: u64, end: u64) -> Self {
        self.map_start = start;
        self.map_end = end;
        self
    }

    #[must_use]
    pub fn with_load_bias(mut self, load_bias: u64) -> Self {
        self.map_load_bias = load_bias;
        self
    }
}
