//! Replay event logs: allocation and free samples recorded as JSON.
//!
//! Format:
//! ```json
//! {
//!   "events": [
//!     {"kind": "alloc", "address": 4096, "size": 64,
//!      "frames": [{"map_name": "/system/lib64/libc.so", "function_name": "malloc", "rel_pc": 16}],
//!      "build_ids": ["a1b2"]},
//!     {"kind": "free", "address": 4096}
//!   ]
//! }
//! ```
//! Frames are leaf-first. `build_ids` may be omitted, meaning unknown for
//! every frame.

use crate::location::FrameData;
use crate::utils::error::ParseError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One recorded sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleEvent {
    Alloc {
        address: u64,
        size: u64,
        frames: Vec<FrameData>,
        #[serde(default)]
        build_ids: Vec<String>,
    },
    Free {
        address: u64,
    },
}

/// A whole replay log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    pub events: Vec<SampleEvent>,
}

impl EventLog {
    pub fn alloc_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, SampleEvent::Alloc { .. }))
            .count()
    }
}

/// Parse an event log from a JSON string
///
/// **Public** - main entry point for log parsing
///
/// # Errors
/// * `ParseError::JsonError` - malformed JSON or unknown event kind
/// * `ParseError::InvalidEvent` - an alloc with a build id count that
///   differs from its frame count
pub fn parse_events(json: &str) -> Result<EventLog, ParseError> {
    let mut log: EventLog = serde_json::from_str(json)?;
    normalize(&mut log)?;

    debug!(
        "Parsed {} events ({} allocations)",
        log.events.len(),
        log.alloc_count()
    );
    Ok(log)
}

/// Read and parse an event log from a file
pub fn read_events(path: impl AsRef<Path>) -> Result<EventLog, ParseError> {
    let path = path.as_ref();
    info!("Reading event log from: {}", path.display());

    let file = File::open(path)?;
    let mut log: EventLog = serde_json::from_reader(BufReader::new(file))?;
    normalize(&mut log)?;

    debug!("Loaded {} events", log.events.len());
    Ok(log)
}

/// Fill omitted build ids and reject mismatched ones
fn normalize(log: &mut EventLog) -> Result<(), ParseError> {
    for (index, event) in log.events.iter_mut().enumerate() {
        let SampleEvent::Alloc {
            frames, build_ids, ..
        } = event
        else {
            continue;
        };

        if build_ids.is_empty() {
            build_ids.resize(frames.len(), String::new());
        } else if build_ids.len() != frames.len() {
            return Err(ParseError::InvalidEvent {
                index,
                reason: format!(
                    "{} frames but {} build ids",
                    frames.len(),
                    build_ids.len()
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alloc_and_free() {
        let json = r#"{
            "events": [
                {"kind": "alloc", "address": 16, "size": 8,
                 "frames": [{"map_name": "/lib/libc.so", "function_name": "malloc", "rel_pc": 4}],
                 "build_ids": ["abc"]},
                {"kind": "free", "address": 16}
            ]
        }"#;

        let log = parse_events(json).unwrap();
        assert_eq!(log.events.len(), 2);
        assert_eq!(log.alloc_count(), 1);
        assert_eq!(log.events[1], SampleEvent::Free { address: 16 });
    }

    #[test]
    fn test_missing_build_ids_are_filled() {
        let json = r#"{"events": [{"kind": "alloc", "address": 1, "size": 1,
            "frames": [{"rel_pc": 1}, {"rel_pc": 2}]}]}"#;

        let log = parse_events(json).unwrap();
        match &log.events[0] {
            SampleEvent::Alloc { build_ids, .. } => assert_eq!(build_ids, &vec![String::new(); 2]),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_build_ids_rejected() {
        let json = r#"{"events": [{"kind": "alloc", "address": 1, "size": 1,
            "frames": [{"rel_pc": 1}], "build_ids": ["a", "b"]}]}"#;

        let result = parse_events(json);
        assert!(matches!(result, Err(ParseError::InvalidEvent { index: 0, .. })));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"{"events": [{"kind": "realloc", "address": 1}]}"#;
        assert!(matches!(parse_events(json), Err(ParseError::JsonError(_))));
    }
}
