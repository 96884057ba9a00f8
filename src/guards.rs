//! RAII access handles returned by `SyncHashMap`.
//!
//! Each guard binds a view of the data to a lock-release obligation so
//! the two cannot be separated: the pointer is only reachable while the
//! guard exists, and dropping the guard performs exactly one release.

use crate::combined_lock::CombinedLock;
use crate::synchronized::Synchronized;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use hashbrown::HashMap;
use parking_lot::lock_api::RawRwLock as _;
use parking_lot::RawRwLock;

/// Exclusive access to one entry's value.
///
/// While this guard lives, the map's structural read lock and the
/// entry's cell lock are both held: no thread can insert, remove, or
/// rehash anywhere in the map, and no other thread can touch this value.
/// Guards for *other* keys coexist freely.
///
/// The guard is `!Send`; it is released on the thread that acquired it.
pub struct ValueGuard<'a, V> {
    value: NonNull<V>,
    lock: CombinedLock<'a>,
}

impl<'a, V> ValueGuard<'a, V> {
    /// # Safety
    ///
    /// `value` must point at the entry whose cell lock `lock` holds, and
    /// stay valid until `lock` releases the structural read hold.
    pub(crate) unsafe fn new(value: NonNull<V>, lock: CombinedLock<'a>) -> Self {
        Self { value, lock }
    }

    /// Release both locks now instead of at end of scope.
    pub fn unlock(mut self) {
        self.lock.unlock();
    }
}

impl<V> Deref for ValueGuard<'_, V> {
    type Target = V;
    fn deref(&self) -> &V {
        // SAFETY: the combined lock holds this entry's cell lock, and
        // the structural read hold keeps the entry in place.
        unsafe { self.value.as_ref() }
    }
}

impl<V> DerefMut for ValueGuard<'_, V> {
    fn deref_mut(&mut self) -> &mut V {
        // SAFETY: as in `deref`; the cell lock is exclusive.
        unsafe { self.value.as_mut() }
    }
}

impl<V: fmt::Debug> fmt::Debug for ValueGuard<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Shared, read-only access to the whole table.
///
/// Multiple snapshot readers coexist; structural writers are excluded
/// until every read guard drops. Individual values still require their
/// cell lock ([`Synchronized::lock`]) to inspect.
pub struct TableReadGuard<'a, K, V, S> {
    table: &'a HashMap<K, Synchronized<V>, S>,
    lock: &'a RawRwLock,
    _nosend: PhantomData<*mut ()>,
}

impl<'a, K, V, S> TableReadGuard<'a, K, V, S> {
    /// # Safety
    ///
    /// The current thread must hold `lock` in read mode; `table` must be
    /// the map that lock guards.
    pub(crate) unsafe fn new(table: &'a HashMap<K, Synchronized<V>, S>, lock: &'a RawRwLock) -> Self {
        Self {
            table,
            lock,
            _nosend: PhantomData,
        }
    }
}

impl<K, V, S> Deref for TableReadGuard<'_, K, V, S> {
    type Target = HashMap<K, Synchronized<V>, S>;
    fn deref(&self) -> &Self::Target {
        self.table
    }
}

impl<K, V, S> Drop for TableReadGuard<'_, K, V, S> {
    fn drop(&mut self) {
        // SAFETY: created with the read hold; released exactly once here.
        unsafe { self.lock.unlock_shared() };
    }
}

impl<K: fmt::Debug, V, S> fmt::Debug for TableReadGuard<'_, K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}

/// Exclusive read-write access to the whole table.
///
/// Insert, remove, and rehash freely through `DerefMut`; while this
/// guard lives, no reader, writer, or value guard exists anywhere in the
/// map, so cells may even be relocated safely.
pub struct TableWriteGuard<'a, K, V, S> {
    table: NonNull<HashMap<K, Synchronized<V>, S>>,
    lock: &'a RawRwLock,
    _marker: PhantomData<&'a mut HashMap<K, Synchronized<V>, S>>,
}

impl<'a, K, V, S> TableWriteGuard<'a, K, V, S> {
    /// # Safety
    ///
    /// The current thread must hold `lock` exclusively; `table` must be
    /// the map that lock guards, valid for `'a`.
    pub(crate) unsafe fn new(table: NonNull<HashMap<K, Synchronized<V>, S>>, lock: &'a RawRwLock) -> Self {
        Self {
            table,
            lock,
            _marker: PhantomData,
        }
    }
}

impl<K, V, S> Deref for TableWriteGuard<'_, K, V, S> {
    type Target = HashMap<K, Synchronized<V>, S>;
    fn deref(&self) -> &Self::Target {
        // SAFETY: the write hold grants exclusive access for 'a.
        unsafe { self.table.as_ref() }
    }
}

impl<K, V, S> DerefMut for TableWriteGuard<'_, K, V, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: as in `deref`, and `&mut self` forbids aliasing.
        unsafe { self.table.as_mut() }
    }
}

impl<K, V, S> Drop for TableWriteGuard<'_, K, V, S> {
    fn drop(&mut self) {
        // SAFETY: created with the write hold; released exactly once here.
        unsafe { self.lock.unlock_exclusive() };
    }
}

impl<K: fmt::Debug, V, S> fmt::Debug for TableWriteGuard<'_, K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}
