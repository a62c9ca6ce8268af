//! JSON dump writer.
//!
//! Writes `CallstackDump` structs to JSON files with proper formatting.

use super::schema::CallstackDump;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Write a dump to a JSON file
///
/// **Public** - main entry point for JSON output
///
/// # Arguments
/// * `dump` - Dump to write
/// * `output_path` - Path to output JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
pub fn write_dump(dump: &CallstackDump, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing callstack dump to: {}", output_path.display());

    validate_output_path(output_path)?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, dump).map_err(OutputError::SerializationFailed)?;

    info!(
        "Dump written successfully ({} bytes)",
        calculate_file_size(output_path)
    );

    Ok(())
}

/// Serialize a dump to a pretty JSON string
pub fn dump_to_string(dump: &CallstackDump) -> Result<String, OutputError> {
    serde_json::to_string_pretty(dump).map_err(OutputError::SerializationFailed)
}

/// Read a dump from a JSON file
///
/// **Public** - used by validation and tests
///
/// # Errors
/// * `OutputError::WriteFailed` - File read error (reusing WriteFailed for I/O)
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_dump(input_path: impl AsRef<Path>) -> Result<CallstackDump, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading callstack dump from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::WriteFailed)?;
    let dump: CallstackDump =
        serde_json::from_reader(file).map_err(OutputError::SerializationFailed)?;

    debug!(
        "Dump loaded: version {}, {} callstacks",
        dump.version,
        dump.callstacks.len()
    );

    Ok(dump)
}

/// Validate that output path is writable
///
/// **Private** - internal validation
fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Calculate file size in bytes
///
/// **Private** - internal utility
fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
