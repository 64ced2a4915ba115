//! Pass-through transaction wrapper.

use stagekv_storage::{
    CancelToken, Context, KeyPrefixTraverser, KeyStream, KeyTraverser, ReadBucket, StoreResult,
    TraversingBucket, TxnBeginner, TxnCompleter, WriteBucket,
};
use std::sync::Arc;

/// Lets a plain store be used where a transactional one is expected,
/// without providing transactions.
///
/// Every operation goes straight to the wrapped store. Beginning a
/// transaction returns another handle on the same store, commit does
/// nothing, and rollback does nothing either: writes made "inside" a
/// transaction are never undone.
#[derive(Debug)]
pub struct NopTxn<B> {
    store: Arc<B>,
}

impl<B: TraversingBucket> NopTxn<B> {
    /// Wraps `store`.
    pub fn new(store: B) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Wraps a shared `store`.
    pub fn from_arc(store: Arc<B>) -> Self {
        Self { store }
    }

    /// Returns the wrapped store.
    #[must_use]
    pub fn store(&self) -> &Arc<B> {
        &self.store
    }
}

impl<B> Clone for NopTxn<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<B: TraversingBucket> ReadBucket for NopTxn<B> {
    fn has(&self, ctx: &Context, key: &str) -> StoreResult<bool> {
        self.store.has(ctx, key)
    }

    fn get(&self, ctx: &Context, key: &str) -> StoreResult<Vec<u8>> {
        self.store.get(ctx, key)
    }
}

impl<B: TraversingBucket> WriteBucket for NopTxn<B> {
    fn set(&self, ctx: &Context, key: &str, value: &[u8]) -> StoreResult<()> {
        self.store.set(ctx, key, value)
    }

    fn delete(&self, ctx: &Context, key: &str) -> StoreResult<()> {
        self.store.delete(ctx, key)
    }
}

impl<B: TraversingBucket> KeyTraverser for NopTxn<B> {
    fn keys(&self, ctx: &Context, cancel: &CancelToken) -> KeyStream<'_> {
        self.store.keys(ctx, cancel)
    }
}

impl<B: TraversingBucket> KeyPrefixTraverser for NopTxn<B> {
    fn keys_with_prefix(
        &self,
        ctx: &Context,
        prefix: &str,
        cancel: &CancelToken,
    ) -> KeyStream<'_> {
        self.store.keys_with_prefix(ctx, prefix, cancel)
    }
}

impl<B: TraversingBucket> TxnCompleter for NopTxn<B> {
    fn commit(&self, _ctx: &Context) -> StoreResult<()> {
        Ok(())
    }

    fn rollback(&self, _ctx: &Context) -> StoreResult<()> {
        Ok(())
    }
}

impl<B: TraversingBucket> TxnBeginner for NopTxn<B> {
    type Txn = NopTxn<B>;

    fn begin_txn(&self, _ctx: &Context) -> StoreResult<Self::Txn> {
        Ok(self.clone())
    }
}
