//! CombinedLock: the composite release capability for a value guard.

use parking_lot::lock_api::{RawMutex as _, RawRwLock as _};
use parking_lot::{RawMutex, RawRwLock};

/// Records simultaneous holdership of the map's structural lock (read
/// mode) and one cell's exclusive lock, and releases both exactly once.
///
/// This owns no data; it is purely a release capability. Modeling the
/// pair as one type with one release method keeps the release order out
/// of caller hands: there is exactly one unlock call site in the crate.
///
/// After release the instance is inert; a second release (including the
/// one `Drop` would perform) is a no-op because the internal references
/// have been cleared.
pub(crate) struct CombinedLock<'a> {
    structural: Option<&'a RawRwLock>,
    cell: Option<&'a RawMutex>,
}

impl<'a> CombinedLock<'a> {
    /// Build the capability from two already-held locks.
    ///
    /// # Safety
    ///
    /// The current thread must hold `structural` in read (shared) mode
    /// and `cell` exclusively, and must not release either through any
    /// other path while this capability exists.
    pub(crate) unsafe fn new(structural: &'a RawRwLock, cell: &'a RawMutex) -> Self {
        Self {
            structural: Some(structural),
            cell: Some(cell),
        }
    }

    /// Release both holds: the cell's exclusive lock first, then the
    /// structural read hold. The structural hold goes last so the map
    /// stays pinned against erase/rehash until the entry is fully
    /// relinquished.
    pub(crate) fn unlock(&mut self) {
        if let Some(cell) = self.cell.take() {
            // SAFETY: construction required the cell lock to be held
            // exclusively by this thread, and the `Option` was just
            // cleared, so this is the single release.
            unsafe { cell.unlock() };
        }
        if let Some(structural) = self.structural.take() {
            // SAFETY: as above, for the structural read hold.
            unsafe { structural.unlock_shared() };
        }
    }
}

impl Drop for CombinedLock<'_> {
    fn drop(&mut self) {
        self.unlock();
    }
}
