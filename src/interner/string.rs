//! Session-lived string interner.
//!
//! Build ids, path components and function names repeat across nearly every
//! frame a profiler sees. They are stored once here and referred to by handle.
//! Strings are never released; the table lives as long as the session.

use super::handle::Interned;
use crate::utils::config::INITIAL_STRING_CAP;
use hashbrown::HashTable;
use rustc_hash::FxBuildHasher;
use std::hash::BuildHasher;

/// Hash-consing table for text blobs
///
/// **Public** - owned by `CodeLocationInterner`
#[derive(Debug, Clone, Default)]
pub struct StringInterner {
    /// Stored strings; a handle's slot indexes here and equals its id
    store: Vec<Box<str>>,
    /// Slots keyed by the hash of the string they hold
    lookup: HashTable<u32>,
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            store: Vec::with_capacity(INITIAL_STRING_CAP),
            lookup: HashTable::with_capacity(INITIAL_STRING_CAP),
        }
    }

    /// Intern a string and return its handle
    ///
    /// **Public** - deduplicates byte-wise
    ///
    /// If an equal string is already stored its handle is returned and
    /// nothing is allocated.
    pub fn intern(&mut self, value: &str) -> Interned<str> {
        let hash = FxBuildHasher.hash_one(value);
        let store = &self.store;

        if let Some(&slot) = self
            .lookup
            .find(hash, |&slot| &*store[slot as usize] == value)
        {
            return Interned::new(u64::from(slot), slot);
        }

        let slot = u32::try_from(self.store.len()).unwrap_or_else(|_| {
            panic!("string interner exhausted {} slots", u32::MAX)
        });
        self.store.push(Box::from(value));

        let store = &self.store;
        self.lookup.insert_unique(hash, slot, |&slot| {
            FxBuildHasher.hash_one(&*store[slot as usize])
        });

        Interned::new(u64::from(slot), slot)
    }

    /// Resolve a handle to its string
    ///
    /// Returns None if the handle did not come from this interner
    pub fn get(&self, handle: Interned<str>) -> Option<&str> {
        self.store.get(handle.slot()).map(|s| &**s)
    }

    /// Number of distinct strings stored
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// All stored strings with their handles, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (Interned<str>, &str)> + '_ {
        self.store.iter().enumerate().map(|(slot, s)| {
            let slot = slot as u32;
            (Interned::new(u64::from(slot), slot), &**s)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut strings = StringInterner::new();
        let a = strings.intern("libc.so");
        let b = strings.intern("libc.so");
        let c = strings.intern("libm.so");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(strings.len(), 2);
    }

    #[test]
    fn test_resolve_roundtrip() {
        let mut strings = StringInterner::new();
        let handle = strings.intern("malloc");
        assert_eq!(strings.get(handle), Some("malloc"));
    }

    #[test]
    fn test_empty_string_is_a_value() {
        let mut strings = StringInterner::new();
        let empty = strings.intern("");
        assert_eq!(strings.get(empty), Some(""));
        assert_eq!(strings.len(), 1);
    }

    #[test]
    fn test_unknown_handle() {
        let strings = StringInterner::new();
        assert_eq!(strings.get(Interned::new(5, 5)), None);
    }

    #[test]
    fn test_iter_in_insertion_order() {
        let mut strings = StringInterner::new();
        strings.intern("system");
        strings.intern("lib64");
        strings.intern("system");

        let values: Vec<&str> = strings.iter().map(|(_, s)| s).collect();
        assert_eq!(values, vec!["system", "lib64"]);
    }

    #[test]
    fn test_debug_lists_stored_strings() {
        let mut strings = StringInterner::new();
        strings.intern("libc.so");
        assert!(format!("{:?}", strings).contains("libc.so"));
    }
}
