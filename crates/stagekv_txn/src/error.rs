//! Error types for transaction helpers.

use stagekv_storage::StoreError;
use thiserror::Error;

/// Result type for [`crate::perform_txn`].
pub type TxnResult<T> = Result<T, TxnError>;

/// Errors from running a closure inside a transaction.
#[derive(Debug, Error)]
pub enum TxnError {
    /// The transaction could not be started.
    #[error("txn begin: {0}")]
    Begin(#[source] StoreError),

    /// The closure failed and the transaction was rolled back.
    #[error("txn rolled back: {0}")]
    RolledBack(#[source] StoreError),

    /// The closure failed and rolling back failed too.
    #[error("txn rollback: {source}; while handling: {cause}")]
    Rollback {
        /// The rollback error.
        source: StoreError,
        /// The closure's error.
        cause: StoreError,
    },

    /// The closure succeeded but committing failed.
    #[error("txn commit: {0}")]
    Commit(#[source] StoreError),
}

impl TxnError {
    /// Returns the store error at the heart of this failure: the closure's
    /// error when it failed, otherwise the begin or commit error.
    #[must_use]
    pub fn store_error(&self) -> &StoreError {
        match self {
            Self::Begin(e) | Self::RolledBack(e) | Self::Commit(e) => e,
            Self::Rollback { cause, .. } => cause,
        }
    }

    /// Returns true if the underlying failure was a missing key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.store_error().is_not_found()
    }
}
