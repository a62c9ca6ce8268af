//! Error types for the entire library.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.
//!
//! Most variants here describe broken caller bookkeeping (double release,
//! mismatched input lengths, handles that outlived their entry) rather than
//! environmental failures. They are returned instead of asserted so callers
//! and tests can observe them.

use thiserror::Error;

/// Errors raised by the refcounted interners
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InternError {
    #[error("Interned handle {id} refers to a released entry")]
    StaleHandle { id: u64 },

    #[error("Interned entry {id} released more times than it was retained")]
    RefcountUnderflow { id: u64 },
}

/// Errors raised by callstack trie operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrieError {
    #[error("Callstack has {frames} frames but {build_ids} build ids")]
    LengthMismatch { frames: usize, build_ids: usize },

    #[error("Callstack node {0} is not part of the trie")]
    UnknownNode(u64),

    #[error("Callstack node {0} released while unreferenced")]
    RefcountUnderflow(u64),

    #[error("Interner error: {0}")]
    Intern(#[from] InternError),
}

/// Errors raised while tracking allocations for a session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Callstack trie error: {0}")]
    Trie(#[from] TrieError),
}

/// Errors that can occur while parsing a replay event log
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to read event log: {0}")]
    ReadFailed(#[from] std::io::Error),

    #[error("Invalid event at index {index}: {reason}")]
    InvalidEvent { index: usize, reason: String },
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("Dump is inconsistent: {0}")]
    Inconsistent(String),
}
