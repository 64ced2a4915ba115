//! Store contract traits.
//!
//! Capabilities are split into narrow traits so callers can depend on only
//! what they use. Composite traits are blanket-implemented for anything that
//! provides their parts.

use crate::context::{CancelToken, Context};
use crate::error::StoreResult;
use crate::keys::KeyStream;

/// Read operations on a key-value store.
pub trait ReadBucket: Send + Sync {
    /// Checks that `key` can be found.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be consulted.
    fn has(&self, ctx: &Context, key: &str) -> StoreResult<bool>;

    /// Retrieves the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error for which [`crate::StoreError::is_not_found`] holds if
    /// the key is absent, or any other error the store reports.
    fn get(&self, ctx: &Context, key: &str) -> StoreResult<Vec<u8>>;
}

/// Write operations on a key-value store.
pub trait WriteBucket: Send + Sync {
    /// Sets `key` to `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn set(&self, ctx: &Context, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Deletes `key`.
    ///
    /// Deleting a key that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the key exists but cannot be removed.
    fn delete(&self, ctx: &Context, key: &str) -> StoreResult<()>;
}

/// A read-write key-value store.
pub trait Bucket: ReadBucket + WriteBucket {}

impl<T: ReadBucket + WriteBucket + ?Sized> Bucket for T {}

/// Enumerates every key in a store.
pub trait KeyTraverser {
    /// Returns all keys in the store.
    ///
    /// Keys have no ordering guarantees. The stream ends early once `cancel`
    /// is raised.
    fn keys(&self, ctx: &Context, cancel: &CancelToken) -> KeyStream<'_>;
}

/// Enumerates keys sharing a prefix.
pub trait KeyPrefixTraverser {
    /// Returns all keys starting with `prefix`.
    ///
    /// Keys have no ordering guarantees. The stream ends early once `cancel`
    /// is raised.
    fn keys_with_prefix(&self, ctx: &Context, prefix: &str, cancel: &CancelToken)
        -> KeyStream<'_>;
}

/// A key-value store that can enumerate its keys, with or without a prefix.
pub trait TraversingBucket: Bucket + KeyTraverser + KeyPrefixTraverser {}

impl<T: Bucket + KeyTraverser + KeyPrefixTraverser + ?Sized> TraversingBucket for T {}

/// Completes a transaction.
pub trait TxnCompleter {
    /// Permanently applies the transaction's changes.
    ///
    /// # Errors
    ///
    /// Returns an error if any change could not be applied. Implementations
    /// over non-transactional stores may have applied some changes already.
    fn commit(&self, ctx: &Context) -> StoreResult<()>;

    /// Discards the transaction's changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the changes could not be discarded.
    fn rollback(&self, ctx: &Context) -> StoreResult<()>;
}

/// Starts transactions.
pub trait TxnBeginner {
    /// The transaction handle.
    type Txn: TraversingBucket + TxnCompleter;

    /// Begins a new transaction that can later be committed or rolled back.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction cannot be started.
    fn begin_txn(&self, ctx: &Context) -> StoreResult<Self::Txn>;
}

/// A traversing store that can start transactions.
///
/// Operations issued directly on the store, outside any begun transaction,
/// commit on their own.
pub trait TransactionalBucket: TxnBeginner + TraversingBucket + TxnCompleter {}

impl<T: TxnBeginner + TraversingBucket + TxnCompleter + ?Sized> TransactionalBucket for T {}

impl<B: ReadBucket + ?Sized> ReadBucket for std::sync::Arc<B> {
    fn has(&self, ctx: &Context, key: &str) -> StoreResult<bool> {
        (**self).has(ctx, key)
    }

    fn get(&self, ctx: &Context, key: &str) -> StoreResult<Vec<u8>> {
        (**self).get(ctx, key)
    }
}

impl<B: WriteBucket + ?Sized> WriteBucket for std::sync::Arc<B> {
    fn set(&self, ctx: &Context, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).set(ctx, key, value)
    }

    fn delete(&self, ctx: &Context, key: &str) -> StoreResult<()> {
        (**self).delete(ctx, key)
    }
}

impl<B: KeyTraverser + ?Sized> KeyTraverser for std::sync::Arc<B> {
    fn keys(&self, ctx: &Context, cancel: &CancelToken) -> KeyStream<'_> {
        (**self).keys(ctx, cancel)
    }
}

impl<B: KeyPrefixTraverser + ?Sized> KeyPrefixTraverser for std::sync::Arc<B> {
    fn keys_with_prefix(
        &self,
        ctx: &Context,
        prefix: &str,
        cancel: &CancelToken,
    ) -> KeyStream<'_> {
        (**self).keys_with_prefix(ctx, prefix, cancel)
    }
}
