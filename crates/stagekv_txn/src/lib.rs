//! # stagekv Transactions
//!
//! In-memory transactions over key-value stores that have none.
//!
//! [`TxnBucket`] wraps any [`TraversingBucket`] and stages writes and deletes
//! per transaction until they are committed or rolled back. Individual keys
//! are protected by a shared, reference-counted [`KeyLockManager`]: keys
//! written by a transaction stay write-locked until it completes, and reads
//! take a shared lock for their duration.
//!
//! ## Guarantees
//!
//! - Read-your-own-writes inside a transaction
//! - Staged operations are invisible to other transactions until commit
//! - Rollback never touches the store and always succeeds
//! - **No commit atomicity**: the store is assumed not to support multi-key
//!   operations, so a failed commit can leave earlier operations applied
//!
//! ## Example
//!
//! ```rust
//! use stagekv_storage::{all_keys, Context, MemoryBucket, TxnBeginner, TxnCompleter, WriteBucket};
//! use stagekv_txn::TxnBucket;
//!
//! let ctx = Context::background();
//! let store = TxnBucket::new(MemoryBucket::new());
//! store.set(&ctx, "hello", b"dlrow").unwrap();
//!
//! let txn = store.begin_txn(&ctx).unwrap();
//! txn.delete(&ctx, "hello").unwrap();
//! assert!(all_keys(&ctx, &txn).is_empty());
//! txn.rollback(&ctx).unwrap();
//!
//! assert_eq!(all_keys(&ctx, &store), vec!["hello".to_string()]);
//! ```
//!
//! [`TraversingBucket`]: stagekv_storage::TraversingBucket

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod complete;
mod error;
mod keys;
mod lock;
mod nop;
mod perform;
mod stage;
mod txn;

pub use error::{TxnError, TxnResult};
pub use lock::{KeyGuard, KeyLockManager};
pub use nop::NopTxn;
pub use perform::perform_txn;
pub use stage::PendingOp;
pub use txn::TxnBucket;
