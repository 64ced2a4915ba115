//! Per-key lock manager.

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A lock table entry: the key's lock and the number of holders and waiters.
#[derive(Debug)]
struct LockEntry {
    lock: Arc<RwLock<()>>,
    refs: usize,
}

#[derive(Debug, Default)]
struct LockTable {
    entries: Mutex<HashMap<String, LockEntry>>,
}

impl LockTable {
    /// Returns the lock for `key`, creating its entry if needed, and counts
    /// the caller as a holder.
    fn checkout(&self, key: &str) -> Arc<RwLock<()>> {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| LockEntry {
                lock: Arc::new(RwLock::new(())),
                refs: 0,
            });
        entry.refs += 1;
        Arc::clone(&entry.lock)
    }
}

/// Grants shared and exclusive locks on individual keys.
///
/// Works like an `RwLock` per key. Entries are reference counted: an entry
/// is created when a key is first locked and removed when its last holder
/// releases it, so memory is bounded by the number of keys currently locked
/// or waited on, not by every key ever touched.
///
/// Cloning a manager yields another handle to the same lock table. A store
/// and every transaction begun from it share one table so that contention
/// between transactions is observed.
///
/// Fairness between waiters is whatever the underlying `RwLock` provides.
/// There is no deadlock detection: two holders taking the same keys in
/// opposite order can deadlock.
///
/// # Example
///
/// ```rust
/// use stagekv_txn::KeyLockManager;
///
/// let locks = KeyLockManager::new();
/// let a = locks.rlock("k");
/// let b = locks.rlock("k");
/// assert_eq!(locks.ref_count("k"), 2);
/// drop((a, b));
/// assert_eq!(locks.entry_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyLockManager {
    table: Arc<LockTable>,
}

impl KeyLockManager {
    /// Creates a manager with an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks `key` for writing, blocking until no one else holds it.
    ///
    /// The lock is held until the returned guard is dropped.
    #[must_use = "the key is unlocked as soon as the guard is dropped"]
    pub fn lock(&self, key: &str) -> KeyGuard {
        let lock = self.table.checkout(key);
        let guard = lock.write_arc();
        trace!(key, "key locked exclusive");
        KeyGuard::new(&self.table, key, Hold::Exclusive { _guard: guard })
    }

    /// Locks `key` for reading, blocking while a writer holds it.
    ///
    /// The lock is held until the returned guard is dropped.
    #[must_use = "the key is unlocked as soon as the guard is dropped"]
    pub fn rlock(&self, key: &str) -> KeyGuard {
        let lock = self.table.checkout(key);
        let guard = lock.read_arc();
        trace!(key, "key locked shared");
        KeyGuard::new(&self.table, key, Hold::Shared { _guard: guard })
    }

    /// Returns the number of keys with a live lock entry.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.table.entries.lock().len()
    }

    /// Returns how many holders and waiters `key` currently has.
    #[must_use]
    pub fn ref_count(&self, key: &str) -> usize {
        self.table
            .entries
            .lock()
            .get(key)
            .map_or(0, |entry| entry.refs)
    }

    /// Returns true if both handles use the same lock table.
    #[must_use]
    pub fn same_table(&self, other: &KeyLockManager) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }
}

/// The owned lock guard, kept only for its drop.
enum Hold {
    Shared {
        _guard: ArcRwLockReadGuard<RawRwLock, ()>,
    },
    Exclusive {
        _guard: ArcRwLockWriteGuard<RawRwLock, ()>,
    },
}

/// A held lock on one key.
///
/// Dropping the guard unlocks the key and releases its lock table entry once
/// no other holder remains.
pub struct KeyGuard {
    table: Arc<LockTable>,
    key: String,
    hold: Option<Hold>,
}

impl KeyGuard {
    fn new(table: &Arc<LockTable>, key: &str, hold: Hold) -> Self {
        Self {
            table: Arc::clone(table),
            key: key.to_string(),
            hold: Some(hold),
        }
    }

    /// Returns the locked key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns true for a write lock.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        matches!(self.hold, Some(Hold::Exclusive { .. }))
    }

    /// Unlocks the key. Equivalent to dropping the guard.
    pub fn unlock(self) {}
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        let mut entries = self.table.entries.lock();
        let exclusive = self.is_exclusive();
        drop(self.hold.take());
        if let Some(entry) = entries.get_mut(&self.key) {
            entry.refs = entry.refs.saturating_sub(1);
            if entry.refs == 0 {
                entries.remove(&self.key);
            }
        }
        trace!(key = %self.key, exclusive, "key unlocked");
    }
}

impl std::fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard")
            .field("key", &self.key)
            .field("exclusive", &self.is_exclusive())
            .finish()
    }
}
