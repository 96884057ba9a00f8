//! sync-hashmap: a concurrent map that lets many threads mutate
//! *different* entries simultaneously while structural changes stay safe.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: package a correct, deadlock-free two-level locking protocol so
//!   callers never juggle two locks by hand.
//! - Layers:
//!   - Synchronized<V>: one value paired with one dedicated exclusive
//!     lock; raw access only under that lock.
//!   - CombinedLock: a release capability recording simultaneous
//!     holdership of {structural read lock, one cell's exclusive lock};
//!     releases both, in one fixed order, exactly once.
//!   - SyncHashMap<K, V, S>: the table of Synchronized cells behind a
//!     single structural RwLock, returning RAII guards for per-entry and
//!     whole-table access.
//!
//! Locking protocol
//! - The structural lock guards which keys exist: insert/remove/rehash
//!   take it in write mode; lookups, snapshots, and value guards take it
//!   in read mode.
//! - A `ValueGuard` holds the structural read lock plus its cell's
//!   exclusive lock for its whole lifetime. Guards on different keys
//!   never block each other; guards on the same key serialize on the
//!   cell lock.
//! - Because every guard pins the structural read lock, `remove` (which
//!   needs the write lock) cannot run until all outstanding guards
//!   anywhere in the map have released. An entry is never destroyed or
//!   relocated while a guard can still reach it.
//! - Release order is fixed at one call site inside `CombinedLock`:
//!   cell lock first, then the structural read hold.
//!
//! Why this split?
//! - Localize invariants: the cell never looks at the table; the map
//!   composes the two locks in exactly one place; the guard owns the only
//!   release capability and cannot release twice.
//! - Minimize unsafe: raw-pointer access is confined to the guard types
//!   and the cell's `value_ptr`; each unsafe block states the lock it
//!   relies on.
//!
//! Expected-condition policy
//! - Lookup miss: `None`, not an error.
//! - Insert on a duplicate key: silent no-op, first value wins.
//! - Remove of a missing key: `None`.
//!
//! Notes and non-goals
//! - Blocking is plain mutual exclusion: no timeouts, no cancellation,
//!   no fairness guarantee beyond the underlying primitives. `try_get`
//!   is the one non-blocking variant.
//! - Values have no shared-read mode; readers of a single value acquire
//!   the same exclusive cell lock writers do.
//! - No ordering between entries; the table is unordered.
//! - Guards are `!Send`: a lock acquired on a thread is released on that
//!   thread.

mod combined_lock;
mod guards;
mod sync_hash_map;
mod synchronized;

// Public surface
pub use guards::{TableReadGuard, TableWriteGuard, ValueGuard};
pub use sync_hash_map::SyncHashMap;
pub use synchronized::{SyncRef, Synchronized};
