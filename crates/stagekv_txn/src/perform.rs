//! Run a closure inside a transaction.

use crate::error::{TxnError, TxnResult};
use stagekv_storage::{Context, StoreResult, TxnBeginner, TxnCompleter};
use tracing::warn;

/// Calls `f` inside a new transaction begun from `beginner`.
///
/// If `f` fails the transaction is rolled back, otherwise it is committed.
///
/// # Errors
///
/// Returns [`TxnError::Begin`] or [`TxnError::Commit`] if those steps fail,
/// [`TxnError::RolledBack`] with `f`'s error after a rollback, or
/// [`TxnError::Rollback`] if the rollback failed as well.
///
/// # Example
///
/// ```rust
/// use stagekv_storage::{Context, MemoryBucket, ReadBucket, WriteBucket};
/// use stagekv_txn::{perform_txn, TxnBucket};
///
/// let ctx = Context::background();
/// let store = TxnBucket::new(MemoryBucket::new());
/// perform_txn(&ctx, &store, |ctx, txn| {
///     txn.set(ctx, "a", b"1")?;
///     txn.set(ctx, "b", b"2")
/// })
/// .unwrap();
/// assert_eq!(store.get(&ctx, "b").unwrap(), b"2");
/// ```
pub fn perform_txn<T, R, F>(ctx: &Context, beginner: &T, f: F) -> TxnResult<R>
where
    T: TxnBeginner + ?Sized,
    F: FnOnce(&Context, &T::Txn) -> StoreResult<R>,
{
    let txn = beginner.begin_txn(ctx).map_err(TxnError::Begin)?;
    match f(ctx, &txn) {
        Ok(value) => {
            txn.commit(ctx).map_err(TxnError::Commit)?;
            Ok(value)
        }
        Err(cause) => {
            if let Err(source) = txn.rollback(ctx) {
                warn!(error = %source, cause = %cause, "rollback failed");
                return Err(TxnError::Rollback { source, cause });
            }
            Err(TxnError::RolledBack(cause))
        }
    }
}
