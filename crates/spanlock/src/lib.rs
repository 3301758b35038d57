//! Blocking range-lock manager.
//!
//! [`RangeLockManager`] grants shared or exclusive access to closed integer
//! intervals `[begin, end]` over some shared resource — byte ranges of a
//! file, key ranges of a sorted store. Overlapping intervals conflict under
//! reader/writer rules; grants on the same exact interval stack a holder
//! count. Acquisition blocks the calling thread until legal. Guards are
//! move-only tokens that release on drop and support in-place
//! [`upgrade`](SharedGuard::upgrade) and
//! [`downgrade`](ExclusiveGuard::downgrade) with no window where the
//! interval is unprotected.
//!
//! The interval index behind the manager is pluggable through
//! [`IntervalIndex`]; [`IntervalMap`] is the default.
//!
//! ```
//! use spanlock::RangeLockManager;
//!
//! let locks = RangeLockManager::new();
//!
//! let read_a = locks.lock_shared((0, 10));
//! let read_b = locks.lock_shared((0, 10)); // shared grants stack
//! drop(read_a);
//!
//! let write = read_b.upgrade(); // sole holder: upgrades in place
//! let read_c = write.downgrade();
//! drop(read_c);
//! assert!(locks.is_empty());
//! ```

pub mod guard;
pub mod manager;

pub use guard::{ExclusiveGuard, SharedGuard};
pub use manager::RangeLockManager;

pub use spanlock_index::{IntervalIndex, IntervalMap};
pub use spanlock_types::{Interval, LockGrant, LockStats};
