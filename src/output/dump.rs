//! Build an id-keyed dump of every stack a session still retains.
//!
//! Each stack is rebuilt with `build_inverse_callstack`; frames, mappings and
//! strings are emitted once each, the first time a stack reaches them.

use super::schema::{
    AllocationEntry, CallstackDump, CallstackEntry, FrameEntry, MappingEntry, StringEntry,
};
use crate::interner::Interned;
use crate::location::{CodeLocationInterner, Frame, Mapping};
use crate::session::ProfilingSession;
use crate::utils::config::SCHEMA_VERSION;
use crate::utils::error::OutputError;
use chrono::Utc;
use log::debug;
use rustc_hash::FxHashSet;

/// Collects interned values reachable from retained stacks, deduplicated by id
#[derive(Default)]
struct DumpBuilder {
    seen_strings: FxHashSet<u64>,
    seen_mappings: FxHashSet<u64>,
    seen_frames: FxHashSet<u64>,
    strings: Vec<StringEntry>,
    mappings: Vec<MappingEntry>,
    frames: Vec<FrameEntry>,
}

impl DumpBuilder {
    fn add_string(
        &mut self,
        locations: &CodeLocationInterner,
        handle: Interned<str>,
    ) -> Result<u64, OutputError> {
        if self.seen_strings.insert(handle.id()) {
            let value = locations
                .string(handle)
                .ok_or_else(|| missing("string", handle.id()))?;
            self.strings.push(StringEntry {
                id: handle.id(),
                value: value.to_owned(),
            });
        }
        Ok(handle.id())
    }

    fn add_mapping(
        &mut self,
        locations: &CodeLocationInterner,
        handle: Interned<Mapping>,
    ) -> Result<u64, OutputError> {
        if !self.seen_mappings.insert(handle.id()) {
            return Ok(handle.id());
        }

        let mapping = locations
            .mapping(handle)
            .ok_or_else(|| missing("mapping", handle.id()))?;
        let build_id = self.add_string(locations, mapping.build_id)?;
        let path_components = mapping
            .path_components
            .iter()
            .map(|component| self.add_string(locations, *component))
            .collect::<Result<Vec<_>, _>>()?;

        self.mappings.push(MappingEntry {
            id: handle.id(),
            build_id,
            path_components,
            exact_offset: mapping.exact_offset,
            start_offset: mapping.start_offset,
            start: mapping.start,
            end: mapping.end,
            load_bias: mapping.load_bias,
        });
        Ok(handle.id())
    }

    fn add_frame(
        &mut self,
        locations: &CodeLocationInterner,
        handle: Interned<Frame>,
    ) -> Result<u64, OutputError> {
        if !self.seen_frames.insert(handle.id()) {
            return Ok(handle.id());
        }

        let frame = locations
            .frame(handle)
            .ok_or_else(|| missing("frame", handle.id()))?;
        let mapping_id = self.add_mapping(locations, frame.mapping)?;
        let function_name_id = self.add_string(locations, frame.function_name)?;

        self.frames.push(FrameEntry {
            id: handle.id(),
            mapping_id,
            function_name_id,
            rel_pc: frame.rel_pc,
        });
        Ok(handle.id())
    }
}

fn missing(kind: &str, id: u64) -> OutputError {
    OutputError::Inconsistent(format!("{} {} is not interned", kind, id))
}

/// Build a dump of the session's retained stacks
///
/// **Public** - main entry point for dump generation
///
/// # Errors
/// * `OutputError::Inconsistent` - a retained stack references a node or
///   interned value that no longer exists
pub fn build_dump(session: &ProfilingSession) -> Result<CallstackDump, OutputError> {
    let trie = session.trie();
    let locations = trie.locations();
    let totals = session.callsite_totals();

    let mut builder = DumpBuilder::default();
    let mut callstacks = Vec::with_capacity(totals.len());
    let mut allocations = Vec::with_capacity(totals.len());

    for callsite in &totals {
        let frames = trie
            .build_inverse_callstack(callsite.node)
            .map_err(|e| OutputError::Inconsistent(e.to_string()))?;

        let frame_ids = frames
            .into_iter()
            .map(|frame| builder.add_frame(locations, frame))
            .collect::<Result<Vec<_>, _>>()?;

        callstacks.push(CallstackEntry {
            id: callsite.node.id(),
            frame_ids,
        });
        allocations.push(AllocationEntry {
            callstack_id: callsite.node.id(),
            live_allocations: callsite.live_allocations,
            live_bytes: callsite.live_bytes,
        });
    }

    debug!(
        "Dump covers {} callstacks, {} frames, {} mappings, {} strings",
        callstacks.len(),
        builder.frames.len(),
        builder.mappings.len(),
        builder.strings.len()
    );

    Ok(CallstackDump {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        stats: trie.stats(),
        counters: session.counters(),
        strings: builder.strings,
        mappings: builder.mappings,
        frames: builder.frames,
        callstacks,
        allocations,
    })
}

/// Check that every id a dump references is defined in it
///
/// **Public** - used by the validate command
pub fn validate_dump(dump: &CallstackDump) -> Result<(), OutputError> {
    let strings: FxHashSet<u64> = dump.strings.iter().map(|s| s.id).collect();
    let mappings: FxHashSet<u64> = dump.mappings.iter().map(|m| m.id).collect();
    let frames: FxHashSet<u64> = dump.frames.iter().map(|f| f.id).collect();
    let callstacks: FxHashSet<u64> = dump.callstacks.iter().map(|c| c.id).collect();

    for mapping in &dump.mappings {
        let referenced = std::iter::once(&mapping.build_id).chain(&mapping.path_components);
        for id in referenced {
            if !strings.contains(id) {
                return Err(missing("string", *id));
            }
        }
    }

    for frame in &dump.frames {
        if !mappings.contains(&frame.mapping_id) {
            return Err(missing("mapping", frame.mapping_id));
        }
        if !strings.contains(&frame.function_name_id) {
            return Err(missing("string", frame.function_name_id));
        }
    }

    for callstack in &dump.callstacks {
        if let Some(id) = callstack.frame_ids.iter().find(|id| !frames.contains(*id)) {
            return Err(missing("frame", *id));
        }
    }

    for allocation in &dump.allocations {
        if !callstacks.contains(&allocation.callstack_id) {
            return Err(missing("callstack", allocation.callstack_id));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::FrameData;

    fn libc(function: &str, rel_pc: u64) -> FrameData {
        FrameData::new("/system/lib64/libc.so", function, rel_pc)
    }

    #[test]
    fn test_dump_deduplicates_shared_frames() {
        let mut session = ProfilingSession::default();
        let x = vec![libc("f2", 2), libc("f1", 1)];
        let y = vec![libc("f3", 3), libc("f1", 1)];
        session.record_allocation(0x10, 8, &x, &["b", "b"]).unwrap();
        session.record_allocation(0x20, 16, &y, &["b", "b"]).unwrap();

        let dump = build_dump(&session).unwrap();
        assert_eq!(dump.callstacks.len(), 2);
        assert_eq!(dump.frames.len(), 3);
        assert_eq!(dump.mappings.len(), 1);
        // build id, three path components, three function names
        assert_eq!(dump.strings.len(), 7);
        assert!(validate_dump(&dump).is_ok());
    }

    #[test]
    fn test_dump_of_empty_session() {
        let session = ProfilingSession::default();
        let dump = build_dump(&session).unwrap();

        assert!(dump.callstacks.is_empty());
        assert!(dump.frames.is_empty());
        assert_eq!(dump.version, SCHEMA_VERSION);
    }

    #[test]
    fn test_validate_detects_dangling_frame() {
        let mut session = ProfilingSession::default();
        session
            .record_allocation(0x10, 8, &[libc("f1", 1)], &["b"])
            .unwrap();
        let mut dump = build_dump(&session).unwrap();
        dump.frames.clear();

        assert!(matches!(
            validate_dump(&dump),
            Err(OutputError::Inconsistent(_))
        ));
    }
}
