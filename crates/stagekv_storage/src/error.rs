//! Error types for key-value store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during key-value store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is absent from the store.
    ///
    /// Every bucket translates its own "missing" signal into this variant so
    /// callers can test for it with [`StoreError::is_not_found`].
    #[error("key not found: {key}")]
    KeyNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// The key cannot be stored by this bucket.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why the key was rejected.
        reason: &'static str,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The operation's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation's context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A backend reported a failure that has no more specific variant.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// An underlying store operation failed for a specific key.
    #[error("{op} {key}: {source}")]
    Failure {
        /// The store operation that failed (`get`, `set`, ...).
        op: &'static str,
        /// The key the operation was applied to.
        key: String,
        /// The underlying error.
        #[source]
        source: Box<StoreError>,
    },

    /// Commit stopped early. The failed entry and everything after it are
    /// still staged and the commit may be retried.
    #[error("partial commit at {key} ({remaining} operations still staged): {source}")]
    PartialCommit {
        /// The key whose operation failed.
        key: String,
        /// Number of operations left in the stage.
        remaining: usize,
        /// The underlying error.
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Creates a key not found error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Wraps `source` with the operation and key it failed on.
    pub fn failure(op: &'static str, key: impl Into<String>, source: StoreError) -> Self {
        Self::Failure {
            op,
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if this error, or any error it wraps, is
    /// [`StoreError::KeyNotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::KeyNotFound { .. } => true,
            Self::Failure { source, .. } | Self::PartialCommit { source, .. } => {
                source.is_not_found()
            }
            _ => false,
        }
    }

    /// Returns true if this error came from a cancelled or expired context.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled | Self::DeadlineExceeded => true,
            Self::Failure { source, .. } | Self::PartialCommit { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }
}
