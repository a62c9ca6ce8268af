//! Hash-consing interners.
//!
//! This module provides:
//! - `Interned<T>` handles that compare by identity
//! - A session-lived string interner
//! - A refcounted interner for structured values (mappings, frames)

pub mod handle;
pub mod string;
pub mod table;

// Re-export main types
pub use handle::Interned;
pub use string::StringInterner;
pub use table::Interner;
