//! Interval-overlap index: the ordered container behind the lock manager.
//!
//! The manager needs exactly six operations from its index: exact-key
//! insert, exact-key lookup (shared and mutable), exact-key removal,
//! overlap queries (first match and all matches, optionally excluding the
//! exact key itself), and emptiness. [`IntervalIndex`] captures that
//! contract; [`IntervalMap`] is the default implementation over
//! `std::collections::BTreeMap`. Any ordered structure with an overlap
//! query — an augmented tree, an interval skip list — can be substituted
//! without touching the lock protocol.
//!
//! The index is a passive structure: it performs no synchronization of its
//! own and is always guarded by the manager's mutex.

use std::collections::BTreeMap;

use spanlock_types::{Interval, LockGrant};

// ---------------------------------------------------------------------------
// IntervalIndex
// ---------------------------------------------------------------------------

/// Operation contract the lock manager requires from its interval index.
///
/// Key discipline is the caller's job: `insert` is only invoked when no
/// entry for the exact key exists, and `remove` only for keys known
/// present. Implementations may debug-assert these but must not rely on
/// them for memory safety.
pub trait IntervalIndex: Send {
    /// Insert a new entry for exact `key`.
    fn insert(&mut self, key: Interval, grant: LockGrant);

    /// Exact-match lookup.
    fn get(&self, key: Interval) -> Option<&LockGrant>;

    /// Exact-match lookup with mutable access to the grant.
    fn get_mut(&mut self, key: Interval) -> Option<&mut LockGrant>;

    /// Remove and return the exact-match entry.
    fn remove(&mut self, key: Interval) -> Option<LockGrant>;

    /// Any one entry whose interval overlaps `key`. With `ignore_self`,
    /// an entry whose key exactly equals `key` is excluded.
    fn first_overlap(&self, key: Interval, ignore_self: bool) -> Option<(Interval, &LockGrant)>;

    /// All entries whose intervals overlap `key`, with the same
    /// `ignore_self` exclusion.
    fn overlaps(&self, key: Interval, ignore_self: bool) -> Vec<(Interval, &LockGrant)>;

    /// All entries, in key order. Used for stats snapshots.
    fn entries(&self) -> Vec<(Interval, &LockGrant)>;

    /// Number of entries.
    fn len(&self) -> usize;

    /// True iff no entries remain.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// IntervalMap
// ---------------------------------------------------------------------------

/// Default [`IntervalIndex`] over a `BTreeMap` ordered by `(begin, end)`.
///
/// Overlap queries scan the ordered prefix of keys with
/// `begin <= query.end` and keep those with `end >= query.begin`. That is
/// O(n) in the worst case, which is fine for the entry counts a lock table
/// holds; workloads with very large live-entry counts can swap in an
/// augmented tree through the trait.
#[derive(Debug, Default)]
pub struct IntervalMap {
    map: BTreeMap<Interval, LockGrant>,
}

impl IntervalMap {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self { map: BTreeMap::new() }
    }

    fn overlap_candidates(
        &self,
        key: Interval,
        ignore_self: bool,
    ) -> impl Iterator<Item = (Interval, &LockGrant)> {
        // Every key with begin <= key.end sorts at or before this bound;
        // anything past it starts after the query ends.
        let bound = Interval::new(key.end(), u64::MAX);
        self.map
            .range(..=bound)
            .filter(move |(k, _)| k.end() >= key.begin())
            .filter(move |(k, _)| !(ignore_self && **k == key))
            .map(|(k, g)| (*k, g))
    }
}

impl IntervalIndex for IntervalMap {
    fn insert(&mut self, key: Interval, grant: LockGrant) {
        let prior = self.map.insert(key, grant);
        debug_assert!(prior.is_none(), "IntervalMap::insert over live entry {key}");
    }

    fn get(&self, key: Interval) -> Option<&LockGrant> {
        self.map.get(&key)
    }

    fn get_mut(&mut self, key: Interval) -> Option<&mut LockGrant> {
        self.map.get_mut(&key)
    }

    fn remove(&mut self, key: Interval) -> Option<LockGrant> {
        self.map.remove(&key)
    }

    fn first_overlap(&self, key: Interval, ignore_self: bool) -> Option<(Interval, &LockGrant)> {
        self.overlap_candidates(key, ignore_self).next()
    }

    fn overlaps(&self, key: Interval, ignore_self: bool) -> Vec<(Interval, &LockGrant)> {
        self.overlap_candidates(key, ignore_self).collect()
    }

    fn entries(&self) -> Vec<(Interval, &LockGrant)> {
        self.map.iter().map(|(k, g)| (*k, g)).collect()
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
