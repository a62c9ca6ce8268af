//! Canonicalize raw unwinder frames into interned `Frame` values.
//!
//! Reference ownership:
//! - a `Frame` entry owns one reference on its `Mapping`
//! - whoever receives an `Interned<Frame>` from this type owns one reference
//!   on it and must hand it back through `release_frame`
//! - strings are never released during a session

use super::frame_data::FrameData;
use super::types::{Frame, Mapping};
use crate::interner::{Interned, Interner, StringInterner};
use crate::utils::config::{INITIAL_FRAME_CAP, INITIAL_MAPPING_CAP, PATH_SEPARATOR};
use crate::utils::error::InternError;
use log::trace;
use serde::{Deserialize, Serialize};

/// Entry counts of the three interning tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternerStats {
    pub strings: usize,
    pub mappings: usize,
    pub frames: usize,
}

/// A frame with every interned field resolved to owned data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrame {
    pub build_id: String,
    pub path_components: Vec<String>,
    pub function_name: String,
    pub rel_pc: u64,
}

impl ResolvedFrame {
    /// Mapping path rebuilt from its components, e.g. `/system/lib64/libc.so`
    pub fn map_path(&self) -> String {
        self.path_components
            .iter()
            .fold(String::new(), |mut path, component| {
                path.push(PATH_SEPARATOR);
                path.push_str(component);
                path
            })
    }
}

/// Owner of the string, mapping and frame interners for one session
///
/// **Public** - injected into `CallstackTrie`
#[derive(Debug, Clone)]
pub struct CodeLocationInterner {
    strings: StringInterner,
    mappings: Interner<Mapping>,
    frames: Interner<Frame>,
}

impl Default for CodeLocationInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeLocationInterner {
    pub fn new() -> Self {
        Self {
            strings: StringInterner::new(),
            mappings: Interner::with_capacity(INITIAL_MAPPING_CAP),
            frames: Interner::with_capacity(INITIAL_FRAME_CAP),
        }
    }

    /// Intern one raw unwinder frame
    ///
    /// **Public** - the adapter entry point
    ///
    /// Interns the build id, each `/`-separated component of the mapping
    /// path (so shared directories deduplicate across libraries), the
    /// resulting `Mapping` and finally the `Frame`.
    ///
    /// # Returns
    /// A frame handle carrying one reference owned by the caller
    pub fn intern_code_location(&mut self, loc: &FrameData, build_id: &str) -> Interned<Frame> {
        let mut mapping = Mapping::new(self.strings.intern(build_id));
        mapping.exact_offset = loc.map_exact_offset;
        mapping.start_offset = loc.map_elf_start_offset;
        mapping.start = loc.map_start;
        mapping.end = loc.map_end;
        mapping.load_bias = loc.map_load_bias;
        mapping.path_components = loc
            .map_name
            .split(PATH_SEPARATOR)
            .filter(|component| !component.is_empty())
            .map(|component| self.strings.intern(component))
            .collect();

        let mapping = self.mappings.intern(mapping);
        let function_name = self.strings.intern(&loc.function_name);

        trace!("Interning frame {}+{:#x}", loc.map_name, loc.rel_pc);
        self.insert_frame(Frame::new(mapping, function_name, loc.rel_pc))
    }

    /// Synthetic frame for the trie root: empty build id, path and name
    pub fn make_root_frame(&mut self) -> Interned<Frame> {
        let mapping = Mapping::new(self.strings.intern(""));
        let mapping = self.mappings.intern(mapping);
        let function_name = self.strings.intern("");
        self.insert_frame(Frame::new(mapping, function_name, 0))
    }

    /// Intern a string for the lifetime of the session
    pub fn intern_string(&mut self, value: &str) -> Interned<str> {
        self.strings.intern(value)
    }

    /// Intern a mapping; the caller owns one reference on the result
    pub fn intern_mapping(&mut self, mapping: Mapping) -> Interned<Mapping> {
        self.mappings.intern(mapping)
    }

    /// Intern a pre-built frame
    ///
    /// **Public** - used by callers that canonicalize frames themselves
    ///
    /// The frame's reference on its mapping is consumed: it is either moved
    /// into the new entry or dropped if an equal frame already exists.
    ///
    /// # Errors
    /// * `InternError::StaleHandle` - the frame's mapping was already released
    pub fn intern_frame(&mut self, frame: Frame) -> Result<Interned<Frame>, InternError> {
        if !self.mappings.contains(frame.mapping) {
            return Err(InternError::StaleHandle {
                id: frame.mapping.id(),
            });
        }
        Ok(self.insert_frame(frame))
    }

    /// Take one more reference on a frame
    pub fn retain_frame(&mut self, frame: Interned<Frame>) -> Result<(), InternError> {
        self.frames.retain(frame)
    }

    /// Drop one reference on a frame, cascading to its mapping on removal
    pub fn release_frame(&mut self, frame: Interned<Frame>) -> Result<(), InternError> {
        if let Some(removed) = self.frames.release(frame)? {
            trace!("Frame {} removed, releasing mapping {}", frame.id(), removed.mapping.id());
            self.mappings.release(removed.mapping)?;
        }
        Ok(())
    }

    /// Drop one reference on a mapping obtained from `intern_mapping`
    pub fn release_mapping(&mut self, mapping: Interned<Mapping>) -> Result<(), InternError> {
        self.mappings.release(mapping).map(|_| ())
    }

    pub fn frame(&self, frame: Interned<Frame>) -> Option<&Frame> {
        self.frames.get(frame)
    }

    pub fn mapping(&self, mapping: Interned<Mapping>) -> Option<&Mapping> {
        self.mappings.get(mapping)
    }

    pub fn string(&self, value: Interned<str>) -> Option<&str> {
        self.strings.get(value)
    }

    /// Resolve a frame and everything it references to owned values
    ///
    /// Returns None if the frame or its mapping has been released
    pub fn resolve_frame(&self, frame: Interned<Frame>) -> Option<ResolvedFrame> {
        let frame = self.frames.get(frame)?;
        let mapping = self.mappings.get(frame.mapping)?;

        let path_components = mapping
            .path_components
            .iter()
            .map(|component| self.strings.get(*component).map(str::to_owned))
            .collect::<Option<Vec<_>>>()?;

        Some(ResolvedFrame {
            build_id: self.strings.get(mapping.build_id)?.to_owned(),
            path_components,
            function_name: self.strings.get(frame.function_name)?.to_owned(),
            rel_pc: frame.rel_pc,
        })
    }

    pub fn strings(&self) -> &StringInterner {
        &self.strings
    }

    pub fn mappings(&self) -> &Interner<Mapping> {
        &self.mappings
    }

    pub fn frames(&self) -> &Interner<Frame> {
        &self.frames
    }

    pub fn stats(&self) -> InternerStats {
        InternerStats {
            strings: self.strings.len(),
            mappings: self.mappings.len(),
            frames: self.frames.len(),
        }
    }

    fn insert_frame(&mut self, frame: Frame) -> Interned<Frame> {
        let (handle, duplicate) = self.frames.intern_with_duplicate(frame);
        if let Some(duplicate) = duplicate {
            // The stored frame holds the same mapping, so this cannot reach zero.
            let released = self.mappings.release(duplicate.mapping);
            debug_assert!(matches!(released, Ok(None)));
        }
        handle
    }
}
