//! Refcounted hash-consing table for structured values.
//!
//! Used for `Mapping` and `Frame`. Each `intern` or `retain` adds one
//! reference to the entry; each `release` drops one. An entry whose count
//! reaches zero is removed and its slot recycled. Values are immutable once
//! stored.

use super::handle::Interned;
use crate::utils::error::InternError;
use hashbrown::HashTable;
use log::trace;
use rustc_hash::FxBuildHasher;
use std::hash::{BuildHasher, Hash};

#[derive(Debug, Clone)]
struct Entry<T> {
    id: u64,
    ref_count: usize,
    value: T,
}

/// Refcounted interner for values hashed and compared structurally
///
/// **Public** - generic over any `Eq + Hash` value
#[derive(Debug, Clone)]
pub struct Interner<T> {
    slots: Vec<Option<Entry<T>>>,
    /// Free slots available for reuse
    free: Vec<u32>,
    /// Occupied slots keyed by the hash of their value
    lookup: HashTable<u32>,
    next_id: u64,
}

impl<T> Default for Interner<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            lookup: HashTable::new(),
            next_id: 0,
        }
    }
}

impl<T: Eq + Hash> Interner<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            lookup: HashTable::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Intern a value, taking one reference on the resulting entry
    ///
    /// **Public** - main entry point
    pub fn intern(&mut self, value: T) -> Interned<T> {
        self.intern_with_duplicate(value).0
    }

    /// Intern a value and hand back the rejected duplicate, if any
    ///
    /// **Public** - for owners whose values hold references of their own
    ///
    /// When an equal entry already exists, `value` is not stored. It is
    /// returned so the caller can drop whatever references it was carrying
    /// (e.g. a `Frame`'s reference on its `Mapping`).
    pub fn intern_with_duplicate(&mut self, value: T) -> (Interned<T>, Option<T>) {
        let hash = FxBuildHasher.hash_one(&value);
        let slots = &self.slots;

        let existing = self.lookup.find(hash, |&slot| {
            slots[slot as usize]
                .as_ref()
                .is_some_and(|entry| entry.value == value)
        });

        if let Some(&slot) = existing {
            if let Some(entry) = self.slots[slot as usize].as_mut() {
                entry.ref_count += 1;
                return (Interned::new(entry.id, slot), Some(value));
            }
        }

        let id = self.next_id;
        self.next_id += 1;

        let entry = Entry {
            id,
            ref_count: 1,
            value,
        };

        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot as usize] = Some(entry);
                slot
            }
            None => {
                let slot = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
                    panic!("interner exhausted {} slots", u32::MAX)
                });
                self.slots.push(Some(entry));
                slot
            }
        };

        let slots = &self.slots;
        self.lookup.insert_unique(hash, slot, |&slot| {
            slots[slot as usize]
                .as_ref()
                .map_or(0, |entry| FxBuildHasher.hash_one(&entry.value))
        });

        trace!("Interned new entry {} in slot {}", id, slot);
        (Interned::new(id, slot), None)
    }

    /// Take one more reference on a live entry
    pub fn retain(&mut self, handle: Interned<T>) -> Result<(), InternError> {
        let entry = self.entry_mut(handle)?;
        entry.ref_count += 1;
        Ok(())
    }

    /// Drop one reference on a live entry
    ///
    /// **Public** - counterpart of `intern` / `retain`
    ///
    /// # Returns
    /// The stored value if this was the last reference and the entry has
    /// been removed, `None` if the entry is still referenced
    pub fn release(&mut self, handle: Interned<T>) -> Result<Option<T>, InternError> {
        let entry = self.entry_mut(handle)?;
        if entry.ref_count == 0 {
            return Err(InternError::RefcountUnderflow { id: handle.id() });
        }
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return Ok(None);
        }

        let slot = handle.slot();
        let removed = self.slots[slot].take();
        let Some(removed) = removed else {
            return Err(InternError::StaleHandle { id: handle.id() });
        };

        let hash = FxBuildHasher.hash_one(&removed.value);
        if let Ok(found) = self.lookup.find_entry(hash, |&s| s as usize == slot) {
            found.remove();
        }
        self.free.push(slot as u32);

        trace!("Released entry {} from slot {}", removed.id, slot);
        Ok(Some(removed.value))
    }

    /// Resolve a handle to its stored value
    ///
    /// Returns None if the entry has been released
    pub fn get(&self, handle: Interned<T>) -> Option<&T> {
        self.entry(handle).map(|entry| &entry.value)
    }

    /// Current reference count of an entry, None if released
    pub fn ref_count(&self, handle: Interned<T>) -> Option<usize> {
        self.entry(handle).map(|entry| entry.ref_count)
    }

    /// Whether the handle still names a live entry
    pub fn contains(&self, handle: Interned<T>) -> bool {
        self.entry(handle).is_some()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entries with their handles, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Interned<T>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(slot, entry)| {
            entry
                .as_ref()
                .map(|entry| (Interned::new(entry.id, slot as u32), &entry.value))
        })
    }

    fn entry(&self, handle: Interned<T>) -> Option<&Entry<T>> {
        self.slots
            .get(handle.slot())
            .and_then(Option::as_ref)
            .filter(|entry| entry.id == handle.id())
    }

    fn entry_mut(&mut self, handle: Interned<T>) -> Result<&mut Entry<T>, InternError> {
        self.slots
            .get_mut(handle.slot())
            .and_then(Option::as_mut)
            .filter(|entry| entry.id == handle.id())
            .ok_or(InternError::StaleHandle { id: handle.id() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Pair(u32, &'static str);

    #[test]
    fn test_equal_values_share_entry() {
        let mut interner = Interner::new();
        let a = interner.intern(Pair(1, "a"));
        let b = interner.intern(Pair(1, "a"));
        let c = interner.intern(Pair(2, "a"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.len(), 2);
        assert_eq!(interner.ref_count(a), Some(2));
        assert_eq!(interner.get(a), Some(&Pair(1, "a")));
    }

    #[test]
    fn test_duplicate_is_returned() {
        let mut interner = Interner::new();
        let (_, first) = interner.intern_with_duplicate(Pair(1, "a"));
        let (_, second) = interner.intern_with_duplicate(Pair(1, "a"));

        assert!(first.is_none());
        assert_eq!(second, Some(Pair(1, "a")));
    }

    #[test]
    fn test_release_removes_at_zero() {
        let mut interner = Interner::new();
        let a = interner.intern(Pair(1, "a"));
        interner.retain(a).unwrap();

        assert_eq!(interner.release(a).unwrap(), None);
        assert!(interner.contains(a));
        assert_eq!(interner.release(a).unwrap(), Some(Pair(1, "a")));
        assert!(!interner.contains(a));
        assert!(interner.is_empty());
    }

    #[test]
    fn test_release_stale_handle_fails() {
        let mut interner = Interner::new();
        let a = interner.intern(Pair(1, "a"));
        interner.release(a).unwrap();

        assert_eq!(
            interner.release(a),
            Err(InternError::StaleHandle { id: a.id() })
        );
    }

    #[test]
    fn test_slot_reuse_gets_fresh_id() {
        let mut interner = Interner::new();
        let a = interner.intern(Pair(1, "a"));
        interner.release(a).unwrap();
        let b = interner.intern(Pair(1, "a"));

        assert_ne!(a, b);
        assert!(b.id() > a.id());
        assert_eq!(interner.get(a), None);
        assert_eq!(interner.get(b), Some(&Pair(1, "a")));
    }

    #[test]
    fn test_reinterning_after_removal_finds_new_entry() {
        let mut interner = Interner::new();
        let a = interner.intern(Pair(1, "a"));
        let other = interner.intern(Pair(2, "b"));
        interner.release(a).unwrap();

        let again = interner.intern(Pair(1, "a"));
        let again_2 = interner.intern(Pair(1, "a"));
        assert_eq!(again, again_2);
        assert_eq!(interner.ref_count(again), Some(2));
        assert_eq!(interner.ref_count(other), Some(1));
        assert_eq!(interner.iter().count(), 2);
    }

    #[test]
    fn test_debug_lists_entries() {
        let mut interner = Interner::new();
        interner.intern(0x7000_u64);
        assert!(format!("{:?}", interner).contains("ref_count: 1"));
    }
}
