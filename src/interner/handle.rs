//! Lightweight handles returned by the interners.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Identity of one interned entry
///
/// **Public** - the currency every interner hands out
///
/// A handle is a stable id plus the slot the entry lives in. Two handles are
/// equal iff they name the same stored entry, no matter how many times the
/// underlying value was interned. The id is never reused, so a handle that
/// outlives its entry cannot be confused with whatever later takes the slot.
///
/// The handle does not own the value. In refcounted interners its validity
/// follows the entry's count; in the string interner it follows the
/// interner's lifetime.
pub struct Interned<T: ?Sized> {
    id: u64,
    slot: u32,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> Interned<T> {
    pub(crate) fn new(id: u64, slot: u32) -> Self {
        Self {
            id,
            slot,
            _marker: PhantomData,
        }
    }

    /// Stable numeric id of the entry
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot as usize
    }
}

// Manual impls: derives would require `T: Clone`/`T: PartialEq`, but a handle
// compares by identity regardless of what it points at.
impl<T: ?Sized> Clone for Interned<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Interned<T> {}

impl<T: ?Sized> PartialEq for Interned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: ?Sized> Eq for Interned<T> {}

impl<T: ?Sized> Hash for Interned<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: ?Sized> PartialOrd for Interned<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Ord for Interned<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T: ?Sized> fmt::Debug for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interned({}@{})", self.id, self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_is_by_id() {
        let a: Interned<str> = Interned::new(7, 0);
        let b: Interned<str> = Interned::new(7, 3);
        let c: Interned<str> = Interned::new(8, 0);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_matches_equality() {
        let mut set = HashSet::new();
        set.insert(Interned::<u64>::new(1, 0));
        set.insert(Interned::<u64>::new(1, 0));
        set.insert(Interned::<u64>::new(2, 1));
        assert_eq!(set.len(), 2);
    }
}
