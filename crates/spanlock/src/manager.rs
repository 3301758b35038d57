//! The lock manager: one coordination point for all interval lock state.
//!
//! [`RangeLockManager`] owns a single mutex over the interval index and a
//! single condvar shared by every blocking predicate — shared and exclusive
//! acquisition, upgrade, downgrade, and teardown. All index mutation
//! happens under the mutex; every release broadcasts to all waiters.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use spanlock_index::{IntervalIndex, IntervalMap};
use spanlock_types::{Interval, LockGrant, LockStats};

use crate::guard::{ExclusiveGuard, SharedGuard};

// ---------------------------------------------------------------------------
// LockCore
// ---------------------------------------------------------------------------

/// Monitor state shared between the manager and its guards.
///
/// Guards hold an `Arc` to this, so releases keep working while the manager
/// itself is blocked in teardown.
pub(crate) struct LockCore<I> {
    index: Mutex<I>,
    /// The one wait/notify channel for every blocking predicate. Waiters
    /// hold heterogeneous predicates over the same index, so state changes
    /// broadcast to all of them; a targeted wake could strand the one
    /// waiter whose predicate just became true.
    retry: Condvar,
}

impl<I: IntervalIndex> LockCore<I> {
    fn new(index: I) -> Self {
        Self {
            index: Mutex::new(index),
            retry: Condvar::new(),
        }
    }

    /// A shared grant on `span` is legal iff no overlapping entry is
    /// exclusive.
    fn shared_legal(index: &I, span: Interval) -> bool {
        index.overlaps(span, false).iter().all(|(_, g)| !g.is_exclusive())
    }

    /// An exclusive grant on `span` is legal iff nothing overlaps it at
    /// all, the exact key included.
    fn exclusive_legal(index: &I, span: Interval) -> bool {
        index.first_overlap(span, false).is_none()
    }

    /// Record a shared grant: stack onto the exact-key entry if one is
    /// live, otherwise create it.
    fn record_shared(index: &mut I, span: Interval) {
        match index.get_mut(span) {
            Some(grant) => grant.add_holder(),
            None => index.insert(span, LockGrant::shared()),
        }
    }

    pub(crate) fn acquire_shared(&self, span: Interval) {
        let mut index = self.index.lock();
        while !Self::shared_legal(&index, span) {
            self.retry.wait(&mut index);
        }
        Self::record_shared(&mut index, span);
        trace!(%span, holders = index.get(span).map_or(0, |g| g.holders()), "shared grant acquired");
    }

    pub(crate) fn acquire_exclusive(&self, span: Interval) {
        let mut index = self.index.lock();
        while !Self::exclusive_legal(&index, span) {
            self.retry.wait(&mut index);
        }
        // The predicate only holds once any prior entry for this exact key
        // has been erased by its last release, so the entry is always
        // freshly created.
        index.insert(span, LockGrant::exclusive());
        trace!(%span, "exclusive grant acquired");
    }

    pub(crate) fn try_acquire_shared(&self, span: Interval) -> bool {
        let mut index = self.index.lock();
        if !Self::shared_legal(&index, span) {
            return false;
        }
        Self::record_shared(&mut index, span);
        trace!(%span, "shared grant acquired (try)");
        true
    }

    pub(crate) fn try_acquire_exclusive(&self, span: Interval) -> bool {
        let mut index = self.index.lock();
        if !Self::exclusive_legal(&index, span) {
            return false;
        }
        index.insert(span, LockGrant::exclusive());
        trace!(%span, "exclusive grant acquired (try)");
        true
    }

    /// Drop one shared holder; erase the entry when the last one goes.
    ///
    /// Broadcasts even when the entry survives: a decrement 2→1 is exactly
    /// what a pending upgrade on this interval is waiting for.
    pub(crate) fn release_shared(&self, span: Interval) {
        let mut index = self.index.lock();
        if let Some(grant) = index.get_mut(span) {
            if grant.remove_holder() {
                index.remove(span);
            }
        }
        trace!(%span, "shared grant released");
        drop(index);
        self.retry.notify_all();
    }

    pub(crate) fn release_exclusive(&self, span: Interval) {
        let mut index = self.index.lock();
        let removed = index.remove(span);
        debug_assert!(removed.is_some(), "exclusive release of absent entry {span}");
        trace!(%span, "exclusive grant released");
        drop(index);
        self.retry.notify_all();
    }

    /// Upgrade the caller's shared grant to exclusive, in place.
    ///
    /// Blocks until the caller is the sole holder of the exact entry and no
    /// other entry overlaps it. The entry is never removed and re-inserted,
    /// so no other thread can observe the interval unlocked during the
    /// transition. The caller's own holder pins the entry, so the exact-key
    /// lookups cannot miss.
    pub(crate) fn promote(&self, span: Interval) {
        let mut index = self.index.lock();
        loop {
            let sole_holder = index.get(span).is_some_and(|g| g.holders() == 1);
            if sole_holder && index.first_overlap(span, true).is_none() {
                break;
            }
            self.retry.wait(&mut index);
        }
        index
            .get_mut(span)
            .expect("upgrading caller pins its entry")
            .promote();
        trace!(%span, "grant upgraded to exclusive");
    }

    /// Downgrade the caller's exclusive grant to shared, in place.
    ///
    /// The wait is vacuous (an exclusive holder implies nothing overlaps)
    /// but runs the same predicate loop as every other transition.
    /// Broadcasts afterward: shared acquisitions blocked on this entry's
    /// exclusivity become legal the moment it flips.
    pub(crate) fn demote(&self, span: Interval) {
        let mut index = self.index.lock();
        while index.first_overlap(span, true).is_some() {
            self.retry.wait(&mut index);
        }
        index
            .get_mut(span)
            .expect("downgrading caller pins its entry")
            .demote();
        trace!(%span, "grant downgraded to shared");
        drop(index);
        self.retry.notify_all();
    }

    /// Block until the index holds no entries.
    fn wait_idle(&self) {
        let mut index = self.index.lock();
        while !index.is_empty() {
            debug!(outstanding = index.len(), "teardown waiting for outstanding grants");
            self.retry.wait(&mut index);
        }
    }
}

// ---------------------------------------------------------------------------
// RangeLockManager
// ---------------------------------------------------------------------------

/// Grants shared and exclusive locks on closed integer intervals.
///
/// Overlapping intervals conflict under the usual reader/writer rules: any
/// number of shared grants may overlap each other, while an exclusive grant
/// tolerates no overlap at all. Grants on the same exact interval stack a
/// holder count; grants on overlapping but distinct intervals are tracked
/// as separate entries. Acquisition blocks the calling thread until legal:
/// there is no fairness or ordering guarantee, no timeout, and no deadlock
/// detection: a thread that blocks on an interval it already covers waits
/// forever.
///
/// Dropping the manager blocks until every outstanding guard has been
/// released; the owner is responsible for tearing down locks before (or
/// while) tearing down the manager.
pub struct RangeLockManager<I: IntervalIndex = IntervalMap> {
    core: Arc<LockCore<I>>,
}

impl RangeLockManager {
    /// Create a manager over the default [`IntervalMap`] index.
    #[must_use]
    pub fn new() -> Self {
        Self::with_index(IntervalMap::new())
    }
}

impl Default for RangeLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: IntervalIndex> RangeLockManager<I> {
    /// Create a manager over a caller-supplied index implementation.
    #[must_use]
    pub fn with_index(index: I) -> Self {
        Self {
            core: Arc::new(LockCore::new(index)),
        }
    }

    /// Acquire a shared lock on `span`, blocking while any overlapping
    /// exclusive grant is live.
    pub fn lock_shared(&self, span: impl Into<Interval>) -> SharedGuard<I> {
        let span = span.into();
        self.core.acquire_shared(span);
        SharedGuard::attached(Arc::clone(&self.core), span)
    }

    /// Acquire an exclusive lock on `span`, blocking while any overlapping
    /// grant — shared or exclusive — is live.
    pub fn lock_exclusive(&self, span: impl Into<Interval>) -> ExclusiveGuard<I> {
        let span = span.into();
        self.core.acquire_exclusive(span);
        ExclusiveGuard::attached(Arc::clone(&self.core), span)
    }

    /// Acquire a shared lock on `span` only if it is legal right now.
    pub fn try_lock_shared(&self, span: impl Into<Interval>) -> Option<SharedGuard<I>> {
        let span = span.into();
        self.core
            .try_acquire_shared(span)
            .then(|| SharedGuard::attached(Arc::clone(&self.core), span))
    }

    /// Acquire an exclusive lock on `span` only if it is legal right now.
    pub fn try_lock_exclusive(&self, span: impl Into<Interval>) -> Option<ExclusiveGuard<I>> {
        let span = span.into();
        self.core
            .try_acquire_exclusive(span)
            .then(|| ExclusiveGuard::attached(Arc::clone(&self.core), span))
    }

    /// Number of live index entries (distinct locked intervals).
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.index.lock().len()
    }

    /// True iff no locks are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.index.lock().is_empty()
    }

    /// Snapshot of the current lock population.
    #[must_use]
    pub fn stats(&self) -> LockStats {
        let index = self.core.index.lock();
        let mut stats = LockStats::default();
        for (_, grant) in index.entries() {
            stats.entries += 1;
            if grant.is_exclusive() {
                stats.exclusive_entries += 1;
            } else {
                stats.shared_entries += 1;
                stats.shared_holders += grant.holders();
            }
        }
        stats
    }
}

impl<I: IntervalIndex> Drop for RangeLockManager<I> {
    /// Blocks until every outstanding guard has released its grant.
    fn drop(&mut self) {
        self.core.wait_idle();
    }
}

impl<I: IntervalIndex> fmt::Debug for RangeLockManager<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeLockManager")
            .field("entries", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- shared stacking on the exact key --

    #[test]
    fn shared_grants_stack_on_exact_interval() {
        let locks = RangeLockManager::new();
        let a = locks.lock_shared((0, 10));
        let b = locks.lock_shared((0, 10));

        let stats = locks.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.shared_holders, 2);

        drop(a);
        let stats = locks.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.shared_holders, 1);

        drop(b);
        assert!(locks.is_empty());
    }

    // -- overlapping but distinct shared intervals are separate entries --

    #[test]
    fn overlapping_shared_intervals_are_independent_entries() {
        let locks = RangeLockManager::new();
        let a = locks.lock_shared((0, 10));
        let b = locks.lock_shared((5, 15));

        let stats = locks.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.shared_holders, 2);

        drop(a);
        let stats = locks.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.shared_holders, 1);

        drop(b);
        assert!(locks.is_empty());
    }

    // -- try variants --

    #[test]
    fn try_exclusive_fails_on_any_overlap() {
        let locks = RangeLockManager::new();
        let shared = locks.lock_shared((0, 10));

        assert!(locks.try_lock_exclusive((5, 8)).is_none());
        assert!(locks.try_lock_exclusive((0, 10)).is_none());
        // Disjoint interval is unaffected.
        let elsewhere = locks.try_lock_exclusive((11, 20)).expect("disjoint");
        drop(elsewhere);

        drop(shared);
        let now = locks.try_lock_exclusive((5, 8)).expect("free after release");
        drop(now);
    }

    #[test]
    fn try_shared_fails_only_on_exclusive_overlap() {
        let locks = RangeLockManager::new();
        let writer = locks.lock_exclusive((0, 10));

        assert!(locks.try_lock_shared((5, 8)).is_none());

        drop(writer);
        let a = locks.try_lock_shared((5, 8)).expect("free after release");
        // Stacking and overlapping shared grants both succeed immediately.
        let b = locks.try_lock_shared((5, 8)).expect("stacks");
        let c = locks.try_lock_shared((0, 6)).expect("overlap is fine");
        assert_eq!(locks.stats().shared_holders, 3);
        drop((a, b, c));
    }

    // -- upgrade / downgrade, uncontended --

    #[test]
    fn sole_holder_upgrade_is_immediate_and_in_place() {
        let locks = RangeLockManager::new();
        let shared = locks.lock_shared((0, 10));

        let exclusive = shared.upgrade();
        let stats = locks.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.exclusive_entries, 1);
        assert_eq!(stats.shared_entries, 0);

        // The upgraded grant conflicts like any exclusive grant.
        assert!(locks.try_lock_shared((0, 10)).is_none());

        drop(exclusive);
        assert!(locks.is_empty());
    }

    #[test]
    fn downgrade_is_immediate_and_stackable() {
        let locks = RangeLockManager::new();
        let exclusive = locks.lock_exclusive((0, 10));

        let shared = exclusive.downgrade();
        let stats = locks.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.shared_entries, 1);
        assert_eq!(stats.shared_holders, 1);

        // The entry now behaves as an ordinary shared entry.
        let stacked = locks.try_lock_shared((0, 10)).expect("shared after downgrade");
        assert_eq!(locks.stats().shared_holders, 2);

        drop(stacked);
        drop(shared);
        assert!(locks.is_empty());
    }

    // -- move semantics --

    #[test]
    fn reassignment_releases_the_previous_grant() {
        let locks = RangeLockManager::new();
        let mut guard = locks.lock_shared((0, 10));
        guard = locks.lock_shared((20, 30));

        // The old grant was released exactly once by the reassignment.
        assert_eq!(locks.len(), 1);
        let old_site = locks.try_lock_exclusive((0, 10)).expect("old interval is free");
        assert!(locks.try_lock_exclusive((20, 30)).is_none());

        drop(old_site);
        drop(guard);
        assert!(locks.is_empty());
    }

    #[test]
    fn moved_guard_releases_exactly_once() {
        let locks = RangeLockManager::new();
        let guard = locks.lock_shared((0, 10));

        let boxed = Box::new(guard);
        assert_eq!(locks.stats().shared_holders, 1);

        drop(boxed);
        assert!(locks.is_empty());
    }

    // -- introspection --

    #[test]
    fn stats_partition_shared_and_exclusive() {
        let locks = RangeLockManager::new();
        let a = locks.lock_shared((0, 10));
        let b = locks.lock_shared((0, 10));
        let c = locks.lock_shared((20, 30));
        let d = locks.lock_exclusive((40, 50));

        let stats = locks.stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.shared_entries, 2);
        assert_eq!(stats.exclusive_entries, 1);
        assert_eq!(stats.shared_holders, 3);
        assert_eq!(locks.len(), 3);

        drop((a, b, c, d));
        assert!(locks.is_empty());
    }
}
