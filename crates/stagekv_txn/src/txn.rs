//! Transactional wrapper over a key-value store.

use crate::lock::{KeyGuard, KeyLockManager};
use crate::stage::{PendingOp, Stage};
use parking_lot::RwLock;
use stagekv_storage::{Context, ReadBucket, StoreError, StoreResult, TraversingBucket, WriteBucket};
use std::sync::Arc;
use tracing::debug;

/// A key-value store wrapper with in-memory transactions.
///
/// Write operations are recorded in a per-transaction stage that can be
/// committed to, or rolled back without touching, the wrapped store. Keys
/// written by a transaction stay write-locked in the shared
/// [`KeyLockManager`] until that transaction commits or rolls back them.
///
/// The wrapper created by [`TxnBucket::new`] is in auto-commit mode: every
/// write is applied to the store straight away. [`TxnBeginner::begin_txn`]
/// on any `TxnBucket` returns a transaction with auto-commit off that shares
/// the store and the lock manager.
///
/// The wrapped store is assumed to offer no multi-key atomicity, so neither
/// does commit: if applying one operation fails, the ones before it have
/// already reached the store.
///
/// [`TxnBeginner::begin_txn`]: stagekv_storage::TxnBeginner::begin_txn
///
/// # Example
///
/// ```rust
/// use stagekv_storage::{Context, MemoryBucket, ReadBucket, TxnBeginner, TxnCompleter, WriteBucket};
/// use stagekv_txn::TxnBucket;
///
/// let ctx = Context::background();
/// let store = TxnBucket::new(MemoryBucket::new());
///
/// let txn = store.begin_txn(&ctx).unwrap();
/// txn.set(&ctx, "a", b"1").unwrap();
/// assert_eq!(txn.get(&ctx, "a").unwrap(), b"1");
/// txn.rollback(&ctx).unwrap();
///
/// assert!(store.get(&ctx, "a").unwrap_err().is_not_found());
/// ```
pub struct TxnBucket<B> {
    pub(crate) store: Arc<B>,
    pub(crate) locks: KeyLockManager,
    pub(crate) stage: RwLock<Stage>,
    pub(crate) auto_commit: bool,
}

impl<B: TraversingBucket> TxnBucket<B> {
    /// Wraps `store` in auto-commit mode with a lock manager of its own.
    ///
    /// Locking is scoped to this wrapper and the transactions begun from it.
    pub fn new(store: B) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Wraps a shared `store` in auto-commit mode with a lock manager of its own.
    pub fn from_arc(store: Arc<B>) -> Self {
        Self::with_lock_manager(store, KeyLockManager::new())
    }

    /// Wraps `store` in auto-commit mode using `locks`.
    ///
    /// Wrappers given clones of one manager coordinate their key locking.
    pub fn with_lock_manager(store: Arc<B>, locks: KeyLockManager) -> Self {
        Self::build(store, locks, true)
    }

    pub(crate) fn build(store: Arc<B>, locks: KeyLockManager, auto_commit: bool) -> Self {
        Self {
            store,
            locks,
            stage: RwLock::new(Stage::default()),
            auto_commit,
        }
    }

    /// Returns the wrapped store.
    #[must_use]
    pub fn store(&self) -> &Arc<B> {
        &self.store
    }

    /// Returns the lock manager shared with related transactions.
    #[must_use]
    pub fn lock_manager(&self) -> &KeyLockManager {
        &self.locks
    }

    /// Returns true if writes are applied immediately.
    #[must_use]
    pub fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// Returns the number of staged operations.
    #[must_use]
    pub fn staged_len(&self) -> usize {
        self.stage.read().len()
    }

    /// Returns the staged operation for `key`, if any.
    #[must_use]
    pub fn staged(&self, key: &str) -> Option<PendingOp> {
        self.stage.read().get(key).cloned()
    }

    fn has_op(&self, key: &str) -> bool {
        self.stage.read().contains(key)
    }

    /// Takes a read lock for the duration of one read, unless this
    /// transaction already holds the key.
    fn read_lock(&self, key: &str) -> Option<KeyGuard> {
        if self.has_op(key) {
            None
        } else {
            Some(self.locks.rlock(key))
        }
    }

    fn stage_op(&self, ctx: &Context, key: &str, op: PendingOp) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::invalid_key(key, "key is empty"));
        }
        // the write lock is taken once per key and handed to the stage
        let guard = if self.has_op(key) {
            None
        } else {
            Some(self.locks.lock(key))
        };

        let mut stage = self.stage.write();
        stage.insert(key, op, guard);
        if self.auto_commit {
            // auto-commit never carries operations over to the next call
            return self.commit_stage(ctx, &mut stage).map_err(|err| {
                stage.clear();
                match err {
                    StoreError::PartialCommit { source, .. } => *source,
                    other => other,
                }
            });
        }
        Ok(())
    }
}

/// Wraps a store error with its key, leaving "not found" untouched.
pub(crate) fn store_failure(op: &'static str, key: &str, err: StoreError) -> StoreError {
    if err.is_not_found() {
        err
    } else {
        StoreError::failure(op, key, err)
    }
}

impl<B: TraversingBucket> ReadBucket for TxnBucket<B> {
    /// Retrieves the value at `key`, preferring this transaction's staged
    /// operation over the store. A staged deletion reads as not found.
    fn get(&self, ctx: &Context, key: &str) -> StoreResult<Vec<u8>> {
        let _read = self.read_lock(key);
        if !self.auto_commit {
            match self.stage.read().get(key) {
                Some(PendingOp::Set(value)) => return Ok(value.clone()),
                Some(PendingOp::Delete) => return Err(StoreError::not_found(key)),
                None => {}
            }
        }
        self.store
            .get(ctx, key)
            .map_err(|e| store_failure("get", key, e))
    }

    /// Checks that `key` can be found, preferring this transaction's staged
    /// operation over the store.
    fn has(&self, ctx: &Context, key: &str) -> StoreResult<bool> {
        let _read = self.read_lock(key);
        if !self.auto_commit {
            if let Some(op) = self.stage.read().get(key) {
                return Ok(!op.is_delete());
            }
        }
        self.store
            .has(ctx, key)
            .map_err(|e| store_failure("has", key, e))
    }
}

impl<B: TraversingBucket> WriteBucket for TxnBucket<B> {
    /// Stages `key` = `value`, committing it immediately in auto-commit mode.
    fn set(&self, ctx: &Context, key: &str, value: &[u8]) -> StoreResult<()> {
        self.stage_op(ctx, key, PendingOp::Set(value.to_vec()))
    }

    /// Stages deletion of `key`, committing it immediately in auto-commit mode.
    fn delete(&self, ctx: &Context, key: &str) -> StoreResult<()> {
        self.stage_op(ctx, key, PendingOp::Delete)
    }
}

impl<B> Drop for TxnBucket<B> {
    fn drop(&mut self) {
        let discarded = self.stage.get_mut().clear();
        if discarded > 0 {
            debug!(discarded, "dropping transaction with staged operations");
        }
    }
}

impl<B> std::fmt::Debug for TxnBucket<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxnBucket")
            .field("auto_commit", &self.auto_commit)
            .field("staged", &self.stage.read().len())
            .finish_non_exhaustive()
    }
}
