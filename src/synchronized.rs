//! Synchronized<V>: one value paired with one dedicated exclusive lock.

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;

/// A value cell whose contents are only reachable with its own exclusive
/// lock held. The cell is a pure holder: no comparison, no hashing, no
/// implicit conversion to the inner value.
///
/// The map composes this cell's lock with its structural lock; standalone
/// locking via [`Synchronized::lock`] is for iterating under a table
/// snapshot, where the structural lock is already held in read mode.
pub struct Synchronized<V> {
    value: UnsafeCell<V>,
    mutex: RawMutex,
}

// SAFETY: like `Mutex<V>`, the cell may be shared between threads when
// `V: Send` because every access to the `UnsafeCell` goes through the
// exclusive lock (or through `&mut self`, which proves exclusivity).
unsafe impl<V: Send> Sync for Synchronized<V> {}

impl<V> Synchronized<V> {
    /// Wrap a value in a cell with its own unlocked mutex.
    pub fn new(value: V) -> Self {
        Self {
            value: UnsafeCell::new(value),
            mutex: RawMutex::INIT,
        }
    }

    /// Acquire this cell's lock alone and return an RAII guard over the
    /// value. Blocks while another thread holds the cell's lock.
    pub fn lock(&self) -> SyncRef<'_, V> {
        self.mutex.lock();
        SyncRef {
            cell: self,
            _nosend: PhantomData,
        }
    }

    /// Access the value through an exclusive borrow. No locking: `&mut
    /// self` already proves no guard or other borrow exists.
    pub fn get_mut(&mut self) -> &mut V {
        self.value.get_mut()
    }

    /// Consume the cell and return the value it holds.
    pub fn into_inner(self) -> V {
        self.value.into_inner()
    }

    /// The cell's lock, for composition by the map. Not an invitation to
    /// lock it directly; pair every acquisition with a release path.
    pub(crate) fn mutex(&self) -> &RawMutex {
        &self.mutex
    }

    /// Raw pointer to the value. The caller must hold the cell's lock for
    /// as long as the pointer is dereferenced.
    pub(crate) fn value_ptr(&self) -> *mut V {
        self.value.get()
    }
}

impl<V> From<V> for Synchronized<V> {
    fn from(value: V) -> Self {
        Self::new(value)
    }
}

impl<V> fmt::Debug for Synchronized<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reading the value would require taking the lock; stay opaque.
        f.debug_struct("Synchronized").finish_non_exhaustive()
    }
}

/// RAII guard for a single cell's lock, independent of the map's
/// structural lock. Unlocks on drop.
pub struct SyncRef<'a, V> {
    cell: &'a Synchronized<V>,
    // Raw-lock release must happen on the acquiring thread.
    _nosend: PhantomData<*mut ()>,
}

impl<V> Deref for SyncRef<'_, V> {
    type Target = V;
    fn deref(&self) -> &V {
        // SAFETY: the guard holds the cell's lock.
        unsafe { &*self.cell.value_ptr() }
    }
}

impl<V> DerefMut for SyncRef<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        // SAFETY: the guard holds the cell's lock exclusively.
        unsafe { &mut *self.cell.value_ptr() }
    }
}

impl<V> Drop for SyncRef<'_, V> {
    fn drop(&mut self) {
        // SAFETY: the guard was created with the lock held and releases
        // it exactly once, here.
        unsafe { self.cell.mutex.unlock() };
    }
}

impl<V: fmt::Debug> fmt::Debug for SyncRef<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
