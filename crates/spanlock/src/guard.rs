//! Move-only guard tokens representing one grant each.
//!
//! A guard is either valid (it references a live index entry through the
//! manager's shared core) or inert, holding no reference at all. Drop and
//! [`SharedGuard::unlock`]/[`ExclusiveGuard::unlock`] release a valid
//! guard's grant exactly once; every operation on an inert guard is a safe
//! no-op. Rust move semantics carry the transfer contract: moving a guard
//! moves the release obligation with it, and assigning over a valid guard
//! drops (and therefore releases) the previous grant first.

use std::fmt;
use std::sync::Arc;

use spanlock_index::{IntervalIndex, IntervalMap};
use spanlock_types::Interval;

use crate::manager::LockCore;

// ---------------------------------------------------------------------------
// SharedGuard
// ---------------------------------------------------------------------------

/// A live shared grant on one exact interval.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SharedGuard<I: IntervalIndex = IntervalMap> {
    core: Option<Arc<LockCore<I>>>,
    span: Interval,
}

impl<I: IntervalIndex> SharedGuard<I> {
    pub(crate) fn attached(core: Arc<LockCore<I>>, span: Interval) -> Self {
        Self { core: Some(core), span }
    }

    /// A guard holding no grant. All operations on it are no-ops.
    pub fn inert() -> Self {
        Self { core: None, span: Interval::new(0, 0) }
    }

    /// True while the guard still holds its grant.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.core.is_some()
    }

    /// The granted interval, or `None` on an inert guard.
    #[must_use]
    pub fn interval(&self) -> Option<Interval> {
        self.core.as_ref().map(|_| self.span)
    }

    /// Release the grant now rather than at drop. No-op on an inert guard.
    pub fn unlock(&mut self) {
        if let Some(core) = self.core.take() {
            core.release_shared(self.span);
        }
    }

    /// Exchange this shared grant for an exclusive one on the same
    /// interval.
    ///
    /// Blocks until the caller is the sole holder of the entry and nothing
    /// else overlaps it, then flips the entry in place — at no point can
    /// another thread observe the interval unlocked. The shared grant is
    /// consumed by the exchange, not separately released. Upgrading an
    /// inert guard returns an inert guard.
    pub fn upgrade(mut self) -> ExclusiveGuard<I> {
        match self.core.take() {
            Some(core) => {
                core.promote(self.span);
                ExclusiveGuard::attached(core, self.span)
            }
            None => ExclusiveGuard::inert(),
        }
    }
}

impl<I: IntervalIndex> Drop for SharedGuard<I> {
    fn drop(&mut self) {
        if let Some(core) = self.core.take() {
            core.release_shared(self.span);
        }
    }
}

impl<I: IntervalIndex> Default for SharedGuard<I> {
    fn default() -> Self {
        Self::inert()
    }
}

impl<I: IntervalIndex> fmt::Debug for SharedGuard<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedGuard")
            .field("interval", &self.interval())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ExclusiveGuard
// ---------------------------------------------------------------------------

/// A live exclusive grant on one exact interval.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ExclusiveGuard<I: IntervalIndex = IntervalMap> {
    core: Option<Arc<LockCore<I>>>,
    span: Interval,
}

impl<I: IntervalIndex> ExclusiveGuard<I> {
    pub(crate) fn attached(core: Arc<LockCore<I>>, span: Interval) -> Self {
        Self { core: Some(core), span }
    }

    /// A guard holding no grant. All operations on it are no-ops.
    pub fn inert() -> Self {
        Self { core: None, span: Interval::new(0, 0) }
    }

    /// True while the guard still holds its grant.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.core.is_some()
    }

    /// The granted interval, or `None` on an inert guard.
    #[must_use]
    pub fn interval(&self) -> Option<Interval> {
        self.core.as_ref().map(|_| self.span)
    }

    /// Release the grant now rather than at drop. No-op on an inert guard.
    pub fn unlock(&mut self) {
        if let Some(core) = self.core.take() {
            core.release_exclusive(self.span);
        }
    }

    /// Exchange this exclusive grant for a shared one on the same interval.
    ///
    /// Completes without blocking in practice, since an exclusive holder
    /// already excludes every overlap, and flips the entry in place; afterward it
    /// behaves as an ordinary shared entry that further shared grants stack
    /// onto. The exclusive grant is consumed by the exchange, not
    /// separately released. Downgrading an inert guard returns an inert
    /// guard, touching no manager state at all.
    pub fn downgrade(mut self) -> SharedGuard<I> {
        match self.core.take() {
            Some(core) => {
                core.demote(self.span);
                SharedGuard::attached(core, self.span)
            }
            None => SharedGuard::inert(),
        }
    }
}

impl<I: IntervalIndex> Drop for ExclusiveGuard<I> {
    fn drop(&mut self) {
        if let Some(core) = self.core.take() {
            core.release_exclusive(self.span);
        }
    }
}

impl<I: IntervalIndex> Default for ExclusiveGuard<I> {
    fn default() -> Self {
        Self::inert()
    }
}

impl<I: IntervalIndex> fmt::Debug for ExclusiveGuard<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveGuard")
            .field("interval", &self.interval())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::manager::RangeLockManager;

    use super::*;

    #[test]
    fn inert_guards_are_safe_no_ops() {
        let mut shared: SharedGuard = SharedGuard::inert();
        assert!(!shared.is_valid());
        assert!(shared.interval().is_none());
        shared.unlock();
        shared.unlock();

        // Upgrade of an inert guard yields an inert guard, and the chain
        // stays inert through downgrade.
        let exclusive = SharedGuard::<IntervalMap>::inert().upgrade();
        assert!(!exclusive.is_valid());
        let mut back = exclusive.downgrade();
        assert!(!back.is_valid());
        back.unlock();
    }

    #[test]
    fn default_guards_are_inert() {
        assert!(!SharedGuard::<spanlock_index::IntervalMap>::default().is_valid());
        assert!(!ExclusiveGuard::<spanlock_index::IntervalMap>::default().is_valid());
    }

    #[test]
    fn unlock_releases_and_disarms_drop() {
        let locks = RangeLockManager::new();
        let mut guard = locks.lock_shared((0, 10));
        assert!(guard.is_valid());
        assert_eq!(guard.interval(), Some(spanlock_types::Interval::new(0, 10)));

        guard.unlock();
        assert!(!guard.is_valid());
        assert!(locks.is_empty());

        // Drop of the now-inert guard must not release a second time.
        drop(guard);
        assert!(locks.is_empty());
    }

    #[test]
    fn exclusive_unlock_erases_the_entry() {
        let locks = RangeLockManager::new();
        let mut guard = locks.lock_exclusive((0, 10));
        guard.unlock();
        assert!(!guard.is_valid());
        assert!(locks.is_empty());

        // The interval is immediately reusable.
        let again = locks.try_lock_exclusive((0, 10)).expect("free after unlock");
        drop(again);
    }

    #[test]
    fn guard_debug_shows_interval_state() {
        let locks = RangeLockManager::new();
        let guard = locks.lock_shared((3, 7));
        let rendered = format!("{guard:?}");
        assert!(rendered.contains("SharedGuard"));
        drop(guard);

        let inert: ExclusiveGuard = ExclusiveGuard::inert();
        assert!(format!("{inert:?}").contains("None"));
    }
}
