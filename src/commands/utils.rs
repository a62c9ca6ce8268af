use crate::output::{read_dump, validate_dump};
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Validate a callstack dump JSON file
pub fn validate_dump_file(file_path: PathBuf) -> Result<()> {
    println!("Validating dump: {}", file_path.display());

    let dump = read_dump(&file_path)?;
    validate_dump(&dump).context("Dump references undefined ids")?;

    println!("✓ Valid callstack dump");
    println!("  Version: {}", dump.version);
    println!("  Generated: {}", dump.generated_at);
    println!("  Callstacks: {}", dump.callstacks.len());
    println!("  Frames: {}", dump.frames.len());
    println!("  Mappings: {}", dump.mappings.len());
    println!("  Strings: {}", dump.strings.len());

    Ok(())
}

/// Display version information
pub fn display_version() {
    println!("callstack-trie v{}", env!("CARGO_PKG_VERSION"));
    println!("Dump Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("Call-stack deduplication for heap profilers.");
}
