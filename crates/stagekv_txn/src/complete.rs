//! Commit, rollback, and beginning nested transactions.

use crate::stage::{PendingOp, Stage};
use crate::txn::{store_failure, TxnBucket};
use stagekv_storage::{Context, StoreError, StoreResult, TraversingBucket, TxnBeginner, TxnCompleter};
use std::sync::Arc;
use tracing::{debug, warn};

impl<B: TraversingBucket> TxnBucket<B> {
    /// Applies every staged operation to the store, in no particular order.
    ///
    /// Each applied operation leaves the stage and its key is unlocked. On
    /// the first failure the failed key is unlocked but stays staged, and
    /// every operation not yet tried stays staged and locked.
    pub(crate) fn commit_stage(&self, ctx: &Context, stage: &mut Stage) -> StoreResult<()> {
        let total = stage.len();
        let keys: Vec<String> = stage.keys("", false);
        for key in keys {
            let result = match stage.get(&key) {
                Some(PendingOp::Set(value)) => self
                    .store
                    .set(ctx, &key, value)
                    .map_err(|e| store_failure("set", &key, e)),
                Some(PendingOp::Delete) => self
                    .store
                    .delete(ctx, &key)
                    .map_err(|e| store_failure("delete", &key, e)),
                None => continue,
            };

            if let Err(source) = result {
                stage.release_lock(&key);
                let remaining = stage.len();
                warn!(
                    key = %key,
                    remaining,
                    applied = total - remaining,
                    error = %source,
                    "commit stopped early"
                );
                return Err(StoreError::PartialCommit {
                    key,
                    remaining,
                    source: Box::new(source),
                });
            }
            stage.remove(&key);
        }

        if !self.auto_commit {
            debug!(applied = total, "transaction committed");
        }
        Ok(())
    }
}

impl<B: TraversingBucket> TxnCompleter for TxnBucket<B> {
    /// Sends the staged operations to the wrapped store.
    ///
    /// This is not atomic. If an operation fails, the operations applied
    /// before it stay applied and the error is
    /// [`StoreError::PartialCommit`]. The failed operation and the untried
    /// ones remain staged, so commit can be retried, or rolled back.
    ///
    /// The failed key's lock is released, so until the commit is retried or
    /// rolled back that key is unprotected: other transactions may lock and
    /// write it, and the retry or a later write through this handle applies
    /// it without relocking.
    fn commit(&self, ctx: &Context) -> StoreResult<()> {
        let mut stage = self.stage.write();
        self.commit_stage(ctx, &mut stage)
    }

    /// Discards the staged operations and unlocks their keys.
    ///
    /// The store is not touched and this never fails.
    fn rollback(&self, _ctx: &Context) -> StoreResult<()> {
        let discarded = self.stage.write().clear();
        debug!(discarded, "transaction rolled back");
        Ok(())
    }
}

impl<B: TraversingBucket> TxnBeginner for TxnBucket<B> {
    type Txn = TxnBucket<B>;

    /// Begins a transaction over the same store and lock manager, with
    /// auto-commit off and an empty stage.
    fn begin_txn(&self, _ctx: &Context) -> StoreResult<Self::Txn> {
        debug!("transaction begun");
        Ok(TxnBucket::build(
            Arc::clone(&self.store),
            self.locks.clone(),
            false,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagekv_storage::{
        all_keys, KeyPrefixTraverser, KeyTraverser, CancelToken, KeyStream, MemoryBucket,
        ReadBucket, WriteBucket,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A memory bucket whose writes to one key fail while armed.
    #[derive(Default)]
    struct FailOn {
        inner: MemoryBucket,
        key: String,
        armed: AtomicBool,
    }

    impl FailOn {
        fn armed(key: &str) -> Self {
            Self {
                key: key.to_string(),
                armed: AtomicBool::new(true),
                ..Self::default()
            }
        }
    }

    impl ReadBucket for FailOn {
        fn has(&self, ctx: &Context, key: &str) -> StoreResult<bool> {
            self.inner.has(ctx, key)
        }

        fn get(&self, ctx: &Context, key: &str) -> StoreResult<Vec<u8>> {
            self.inner.get(ctx, key)
        }
    }

    impl WriteBucket for FailOn {
        fn set(&self, ctx: &Context, key: &str, value: &[u8]) -> StoreResult<()> {
            if key == self.key && self.armed.load(Ordering::SeqCst) {
                return Err(StoreError::backend("injected"));
            }
            self.inner.set(ctx, key, value)
        }

        fn delete(&self, ctx: &Context, key: &str) -> StoreResult<()> {
            self.inner.delete(ctx, key)
        }
    }

    impl KeyTraverser for FailOn {
        fn keys(&self, ctx: &Context, cancel: &CancelToken) -> KeyStream<'_> {
            self.inner.keys(ctx, cancel)
        }
    }

    impl KeyPrefixTraverser for FailOn {
        fn keys_with_prefix(
            &self,
            ctx: &Context,
            prefix: &str,
            cancel: &CancelToken,
        ) -> KeyStream<'_> {
            self.inner.keys_with_prefix(ctx, prefix, cancel)
        }
    }

    #[test]
    fn commit_empties_stage_and_unlocks() {
        let ctx = Context::background();
        let root = TxnBucket::new(MemoryBucket::new());
        let txn = root.begin_txn(&ctx).unwrap();
        txn.set(&ctx, "a", b"1").unwrap();
        txn.delete(&ctx, "b").unwrap();
        assert_eq!(txn.staged_len(), 2);
        assert_eq!(root.lock_manager().entry_count(), 2);

        txn.commit(&ctx).unwrap();
        assert_eq!(txn.staged_len(), 0);
        assert_eq!(root.lock_manager().entry_count(), 0);
        assert_eq!(root.get(&ctx, "a").unwrap(), b"1");
    }

    #[test]
    fn rollback_leaves_store_untouched() {
        let ctx = Context::background();
        let root = TxnBucket::new(MemoryBucket::new());
        root.set(&ctx, "k1", b"v1").unwrap();

        let txn = root.begin_txn(&ctx).unwrap();
        txn.set(&ctx, "k1", b"v2").unwrap();
        txn.set(&ctx, "k2", b"new").unwrap();
        txn.rollback(&ctx).unwrap();

        assert_eq!(txn.staged_len(), 0);
        assert_eq!(root.lock_manager().entry_count(), 0);
        assert_eq!(root.get(&ctx, "k1").unwrap(), b"v1");
        assert!(root.get(&ctx, "k2").unwrap_err().is_not_found());
        assert_eq!(root.store().len(), 1);
    }

    #[test]
    fn failed_commit_keeps_failed_and_untried_ops() {
        let ctx = Context::background();
        let root = TxnBucket::new(FailOn::armed("bad"));
        let txn = root.begin_txn(&ctx).unwrap();
        for key in ["a", "b", "bad", "c", "d"] {
            txn.set(&ctx, key, b"v").unwrap();
        }

        let err = txn.commit(&ctx).unwrap_err();
        let (key, remaining) = match &err {
            StoreError::PartialCommit { key, remaining, .. } => (key.clone(), *remaining),
            other => panic!("unexpected error: {other}"),
        };
        assert_eq!(key, "bad");
        assert_eq!(txn.staged_len(), remaining);
        assert!(txn.staged("bad").is_some());

        // applied ops left the stage; the rest are still there
        let applied = all_keys(&ctx, root.store().as_ref());
        assert_eq!(applied.len() + remaining, 5);
        for key in &applied {
            assert!(txn.staged(key).is_none());
        }

        // the failed key is unlocked, untried keys are still locked
        let locks = root.lock_manager();
        assert_eq!(locks.ref_count("bad"), 0);
        assert_eq!(locks.entry_count(), remaining - 1);

        txn.rollback(&ctx).unwrap();
        assert_eq!(locks.entry_count(), 0);
    }

    #[test]
    fn commit_can_be_retried() {
        let ctx = Context::background();
        let root = TxnBucket::new(FailOn::armed("bad"));
        let txn = root.begin_txn(&ctx).unwrap();
        for key in ["a", "bad", "c"] {
            txn.set(&ctx, key, b"v").unwrap();
        }
        assert!(txn.commit(&ctx).is_err());

        root.store().armed.store(false, Ordering::SeqCst);
        txn.commit(&ctx).unwrap();

        assert_eq!(txn.staged_len(), 0);
        assert_eq!(root.lock_manager().entry_count(), 0);
        let mut keys = all_keys(&ctx, root.store().as_ref());
        keys.sort();
        assert_eq!(keys, vec!["a", "bad", "c"]);
    }

    #[test]
    fn failed_auto_commit_write_is_discarded() {
        let ctx = Context::background();
        let root = TxnBucket::new(FailOn::armed("bad"));

        let err = root.set(&ctx, "bad", b"v").unwrap_err();
        assert!(matches!(err, StoreError::Failure { op: "set", .. }));
        assert_eq!(root.staged_len(), 0);
        assert_eq!(root.lock_manager().entry_count(), 0);

        root.set(&ctx, "good", b"v").unwrap();
        assert!(!root.store().inner.has(&ctx, "bad").unwrap());
        assert!(root.store().inner.has(&ctx, "good").unwrap());
    }

    #[test]
    fn failed_key_stays_unlocked_until_retry() {
        let ctx = Context::background();
        let root = TxnBucket::new(FailOn::armed("bad"));
        let txn = root.begin_txn(&ctx).unwrap();
        txn.set(&ctx, "bad", b"v1").unwrap();
        assert!(txn.commit(&ctx).is_err());
        assert_eq!(root.lock_manager().ref_count("bad"), 0);

        // a sibling can take the key while the op is still staged
        let sibling = root.begin_txn(&ctx).unwrap();
        sibling.delete(&ctx, "bad").unwrap();
        sibling.rollback(&ctx).unwrap();

        txn.set(&ctx, "bad", b"v2").unwrap();
        assert_eq!(root.lock_manager().ref_count("bad"), 0);
        assert_eq!(txn.staged("bad"), Some(PendingOp::Set(b"v2".to_vec())));

        root.store().armed.store(false, Ordering::SeqCst);
        txn.commit(&ctx).unwrap();
        assert_eq!(root.get(&ctx, "bad").unwrap(), b"v2");
    }

    #[test]
    fn begin_shares_store_and_locks() {
        let ctx = Context::background();
        let root = TxnBucket::new(MemoryBucket::new());
        let txn = root.begin_txn(&ctx).unwrap();
        let nested = txn.begin_txn(&ctx).unwrap();

        assert!(root.is_auto_commit());
        assert!(!txn.is_auto_commit());
        assert!(!nested.is_auto_commit());
        assert!(Arc::ptr_eq(root.store(), nested.store()));
        assert!(root.lock_manager().same_table(nested.lock_manager()));
    }

    #[test]
    fn drop_releases_locks() {
        let ctx = Context::background();
        let root = TxnBucket::new(MemoryBucket::new());
        {
            let txn = root.begin_txn(&ctx).unwrap();
            txn.set(&ctx, "k", b"v").unwrap();
            assert_eq!(root.lock_manager().entry_count(), 1);
        }
        assert_eq!(root.lock_manager().entry_count(), 0);
        assert!(!root.has(&ctx, "k").unwrap());
    }
}
