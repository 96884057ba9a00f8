//! SyncHashMap: the table of synchronized cells and the locking protocol.

use crate::combined_lock::CombinedLock;
use crate::guards::{TableReadGuard, TableWriteGuard, ValueGuard};
use crate::synchronized::Synchronized;
use core::borrow::Borrow;
use core::cell::UnsafeCell;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ptr::NonNull;
use hashbrown::hash_map::DefaultHashBuilder;
use hashbrown::HashMap;
use parking_lot::lock_api::{RawMutex as _, RawRwLock as _};
use parking_lot::RawRwLock;

/// A concurrent map with two-level locking: one reader/writer lock for
/// the structure (which keys exist) and one exclusive lock per value.
///
/// Threads operating on different keys proceed in parallel; threads on
/// the same key serialize on that entry's cell lock; structural changes
/// (insert, remove, rehash) exclude everything and are excluded by any
/// outstanding guard.
///
/// The map hands out RAII guards rather than bare references, so a
/// caller cannot forget to release, release out of order, or keep a
/// pointer to an entry that a structural change could invalidate.
pub struct SyncHashMap<K, V, S = DefaultHashBuilder> {
    table: UnsafeCell<HashMap<K, Synchronized<V>, S>>,
    structural: RawRwLock,
}

// SAFETY: the map owns its entries; moving it between threads moves the
// table contents, which needs the same bounds as the table itself.
unsafe impl<K: Send, V: Send, S: Send> Send for SyncHashMap<K, V, S> {}

// SAFETY: shared access is mediated entirely by the structural RwLock
// and the per-cell mutexes. `&self` methods can drop or return `K`/`V`
// on any thread (hence `Send`) and hand out `&K` during iteration
// (hence `Sync` on `K`); values only ever cross threads by move or
// under a cell lock, so `V: Send` suffices. These are the bounds of
// `RwLock<HashMap<K, Mutex<V>, S>>`.
unsafe impl<K: Send + Sync, V: Send, S: Send + Sync> Sync for SyncHashMap<K, V, S> {}

impl<K, V> SyncHashMap<K, V>
where
    K: Eq + Hash,
{
    /// Create an empty map.
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    /// Create an empty map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: UnsafeCell::new(HashMap::with_capacity_and_hasher(
                capacity,
                Default::default(),
            )),
            structural: RawRwLock::INIT,
        }
    }

    /// Bulk-load from a plain map, moving every value into its own
    /// synchronized cell. Construction owns the data outright, so there
    /// is nothing to race with until the returned map is shared.
    pub fn from_map<H>(source: std::collections::HashMap<K, V, H>) -> Self {
        let mut table = HashMap::with_capacity_and_hasher(source.len(), Default::default());
        for (k, v) in source {
            table.insert(k, Synchronized::new(v));
        }
        Self {
            table: UnsafeCell::new(table),
            structural: RawRwLock::INIT,
        }
    }
}

impl<K, V> Default for SyncHashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> SyncHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Create an empty map that hashes with `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: UnsafeCell::new(HashMap::with_hasher(hasher)),
            structural: RawRwLock::INIT,
        }
    }

    /// Number of entries. Takes the structural lock in read mode.
    pub fn len(&self) -> usize {
        self.structural.lock_shared();
        // SAFETY: the read hold keeps the table stable.
        let len = unsafe { &*self.table.get() }.len();
        // SAFETY: acquired just above, released exactly once.
        unsafe { self.structural.unlock_shared() };
        len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Membership probe. No side effect beyond the probe.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.structural.lock_shared();
        // SAFETY: the read hold keeps the table stable.
        let found = unsafe { &*self.table.get() }.contains_key(key);
        // SAFETY: acquired just above, released exactly once.
        unsafe { self.structural.unlock_shared() };
        found
    }

    /// Exclusive access to one entry's value, or `None` if the key is
    /// absent.
    ///
    /// On a hit this blocks until the entry's cell lock is free, keeping
    /// the structural read hold while waiting: even a parked caller must
    /// keep excluding removal of the very entry it is waiting for. The
    /// returned guard holds both locks until dropped.
    ///
    /// **Locking behaviour:** deadlocks if the calling thread already
    /// holds a guard for the same key or a [`write`](Self::write) guard.
    pub fn get<Q>(&self, key: &Q) -> Option<ValueGuard<'_, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.structural.lock_shared();
        // SAFETY: the read hold keeps the table stable for 'self; the
        // hold is only released through the miss arm below or the
        // returned guard's CombinedLock.
        let table = unsafe { &*self.table.get() };
        match table.get(key) {
            None => {
                // SAFETY: acquired above; the miss path releases here.
                unsafe { self.structural.unlock_shared() };
                None
            }
            Some(cell) => {
                cell.mutex().lock();
                // SAFETY: this thread holds the structural lock shared
                // and the cell lock exclusively.
                let lock = unsafe { CombinedLock::new(&self.structural, cell.mutex()) };
                // SAFETY: `value_ptr` is non-null, and the structural
                // read hold pins the entry for the guard's lifetime.
                let value = unsafe { NonNull::new_unchecked(cell.value_ptr()) };
                Some(unsafe { ValueGuard::new(value, lock) })
            }
        }
    }

    /// Non-blocking variant of [`get`](Self::get): returns `None` if the
    /// key is absent *or* if either lock is currently contended.
    pub fn try_get<Q>(&self, key: &Q) -> Option<ValueGuard<'_, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        if !self.structural.try_lock_shared() {
            return None;
        }
        // SAFETY: as in `get`.
        let table = unsafe { &*self.table.get() };
        match table.get(key) {
            Some(cell) if cell.mutex().try_lock() => {
                // SAFETY: as in `get`; both locks now held.
                let lock = unsafe { CombinedLock::new(&self.structural, cell.mutex()) };
                let value = unsafe { NonNull::new_unchecked(cell.value_ptr()) };
                Some(unsafe { ValueGuard::new(value, lock) })
            }
            _ => {
                // SAFETY: acquired above; absent or contended releases here.
                unsafe { self.structural.unlock_shared() };
                None
            }
        }
    }

    /// Shared snapshot of the whole table. Concurrent snapshot readers
    /// coexist; structural writers wait. Values still require each
    /// cell's own lock to inspect.
    pub fn read(&self) -> TableReadGuard<'_, K, V, S> {
        self.structural.lock_shared();
        // SAFETY: the read hold was just acquired and is owned by the
        // returned guard.
        unsafe { TableReadGuard::new(&*self.table.get(), &self.structural) }
    }

    /// Exclusive access to the whole table, for cross-key atomicity or
    /// bulk restructuring. Blocks until every reader and value guard
    /// releases, and excludes all of them until dropped.
    ///
    /// **Locking behaviour:** deadlocks if the calling thread already
    /// holds any guard from this map.
    pub fn write(&self) -> TableWriteGuard<'_, K, V, S> {
        self.structural.lock_exclusive();
        // SAFETY: the write hold was just acquired and is owned by the
        // returned guard; the pointer derives from a live `UnsafeCell`.
        unsafe {
            TableWriteGuard::new(
                NonNull::new_unchecked(self.table.get()),
                &self.structural,
            )
        }
    }

    /// Insert `value` under `key` if the key is absent. A duplicate key
    /// is a silent no-op and the existing value stays untouched; remove
    /// first (or go through [`write`](Self::write)) for replace
    /// semantics.
    ///
    /// **Locking behaviour:** deadlocks if the calling thread already
    /// holds any guard from this map.
    pub fn insert(&self, key: K, value: V) {
        self.structural.lock_exclusive();
        // SAFETY: the write hold grants exclusive table access.
        let table = unsafe { &mut *self.table.get() };
        table.entry(key).or_insert_with(|| Synchronized::new(value));
        // SAFETY: acquired just above, released exactly once.
        unsafe { self.structural.unlock_exclusive() };
    }

    /// Remove `key`'s entry, returning its value; `None` if absent.
    ///
    /// Waits for the structural write lock, and therefore for every
    /// outstanding guard in the map: a value guard pins the structural
    /// read hold for its lifetime, so an entry is never destroyed while
    /// any thread can still reach it.
    ///
    /// **Locking behaviour:** deadlocks if the calling thread already
    /// holds any guard from this map.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.structural.lock_exclusive();
        // SAFETY: the write hold grants exclusive table access, and
        // excludes every value guard, so each cell lock is free.
        let table = unsafe { &mut *self.table.get() };
        let removed = table.remove(key).map(Synchronized::into_inner);
        // SAFETY: acquired just above, released exactly once.
        unsafe { self.structural.unlock_exclusive() };
        removed
    }
}

impl<K, V, S> fmt::Debug for SyncHashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Listing keys would need the structural lock; stay opaque so
        // Debug is usable while any guard is held.
        f.debug_struct("SyncHashMap").finish_non_exhaustive()
    }
}
