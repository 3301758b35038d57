//! Foundation types for the spanlock workspace.
//!
//! This crate holds the plain data types shared by the interval index and
//! the lock manager: [`Interval`] (the lock key), [`LockGrant`] (the
//! per-entry lock state), and [`LockStats`] (an introspection snapshot).
//! It deliberately has no dependency on the runtime machinery so index
//! implementations can be written against it in isolation.

use std::fmt;

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// A closed range `[begin, end]` of positions used as a lock key.
///
/// Intervals are stored verbatim: no normalization, no merging of adjacent
/// or overlapping keys. Two callers locking overlapping but non-identical
/// ranges produce two distinct index entries. The total order is
/// lexicographic on `(begin, end)` so intervals can key an ordered map.
///
/// An interval with `begin > end` contains no positions; it overlaps
/// nothing and locks vacuously.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Interval {
    begin: u64,
    end: u64,
}

impl Interval {
    /// Create an interval covering positions `begin..=end`.
    #[inline]
    #[must_use]
    pub const fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    /// First position covered by the interval.
    #[inline]
    #[must_use]
    pub const fn begin(self) -> u64 {
        self.begin
    }

    /// Last position covered by the interval.
    #[inline]
    #[must_use]
    pub const fn end(self) -> u64 {
        self.end
    }

    /// True iff `self` and `other` share at least one position.
    ///
    /// An exact match is a special case of overlap.
    #[inline]
    #[must_use]
    pub const fn overlaps(self, other: Interval) -> bool {
        self.begin <= other.end && other.begin <= self.end
    }
}

impl From<(u64, u64)> for Interval {
    fn from((begin, end): (u64, u64)) -> Self {
        Self::new(begin, end)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.begin, self.end)
    }
}

// ---------------------------------------------------------------------------
// LockGrant
// ---------------------------------------------------------------------------

/// The lock state stored per index entry.
///
/// A grant is either exclusive (always exactly one holder) or shared
/// (`holders` counts the live shared guards stacked on the exact interval).
/// The counting rules live here so every index implementation stores the
/// same state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LockGrant {
    holders: u64,
    exclusive: bool,
}

impl LockGrant {
    /// A fresh shared grant with a single holder.
    #[inline]
    #[must_use]
    pub const fn shared() -> Self {
        Self { holders: 1, exclusive: false }
    }

    /// A fresh exclusive grant. Exclusive grants always have one holder.
    #[inline]
    #[must_use]
    pub const fn exclusive() -> Self {
        Self { holders: 1, exclusive: true }
    }

    /// Number of live guards referencing this entry.
    #[inline]
    #[must_use]
    pub const fn holders(self) -> u64 {
        self.holders
    }

    /// Whether the grant is exclusive.
    #[inline]
    #[must_use]
    pub const fn is_exclusive(self) -> bool {
        self.exclusive
    }

    /// Stack one more shared holder onto this entry.
    pub fn add_holder(&mut self) {
        debug_assert!(!self.exclusive, "LockGrant::add_holder on an exclusive grant");
        self.holders += 1;
    }

    /// Drop one holder. Returns `true` when the last holder is gone and the
    /// entry must be erased.
    pub fn remove_holder(&mut self) -> bool {
        debug_assert!(self.holders > 0, "LockGrant::remove_holder on an empty grant");
        self.holders -= 1;
        self.holders == 0
    }

    /// Flip a sole-holder shared grant to exclusive, in place.
    pub fn promote(&mut self) {
        debug_assert!(!self.exclusive, "LockGrant::promote on an exclusive grant");
        debug_assert_eq!(self.holders, 1, "LockGrant::promote with stacked holders");
        self.exclusive = true;
    }

    /// Flip an exclusive grant to shared, in place. The holder count stays 1.
    pub fn demote(&mut self) {
        debug_assert!(self.exclusive, "LockGrant::demote on a shared grant");
        self.exclusive = false;
    }
}

// ---------------------------------------------------------------------------
// LockStats
// ---------------------------------------------------------------------------

/// Point-in-time snapshot of a lock manager's state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LockStats {
    /// Total number of index entries.
    pub entries: usize,
    /// Entries holding a shared grant.
    pub shared_entries: usize,
    /// Entries holding an exclusive grant.
    pub exclusive_entries: usize,
    /// Total shared holders summed across all shared entries.
    pub shared_holders: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
