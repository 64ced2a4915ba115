//! # stagekv Storage
//!
//! Key-value store contract and bucket implementations for stagekv.
//!
//! A bucket is an **opaque byte store** addressed by string keys. This crate
//! defines the capabilities a bucket may offer, the error taxonomy they share,
//! and a few concrete buckets.
//!
//! ## Design Principles
//!
//! - Capabilities are narrow traits ([`ReadBucket`], [`WriteBucket`],
//!   [`KeyTraverser`], [`KeyPrefixTraverser`], [`TxnBeginner`],
//!   [`TxnCompleter`]) composed by blanket-implemented supertraits
//! - No multi-key atomicity is assumed of any bucket
//! - Buckets must be `Send + Sync` for concurrent access
//! - Key enumeration is lazy, unordered, and cancellable
//!
//! ## Available Buckets
//!
//! - [`MemoryBucket`] - For testing and ephemeral storage
//! - [`FileBucket`] - One file per key in a flat directory
//! - [`PrefixBucket`] - Namespaces keys of another bucket
//!
//! ## Example
//!
//! ```rust
//! use stagekv_storage::{all_keys, Context, MemoryBucket, WriteBucket};
//!
//! let ctx = Context::background();
//! let bucket = MemoryBucket::new();
//! bucket.set(&ctx, "hello", b"world").unwrap();
//! assert_eq!(all_keys(&ctx, &bucket), vec!["hello".to_string()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod config;
mod context;
mod error;
mod file;
mod helpers;
mod keys;
mod memory;
mod prefix;

pub use bucket::{
    Bucket, KeyPrefixTraverser, KeyTraverser, ReadBucket, TransactionalBucket, TraversingBucket,
    TxnBeginner, TxnCompleter, WriteBucket,
};
pub use config::{FileBucketConfig, DEFAULT_STAGING_DIR};
pub use context::{CancelToken, Context};
pub use error::{StoreError, StoreResult};
pub use file::FileBucket;
pub use helpers::{all_keys, all_keys_with_prefix, delete_keys, get_map, set_map};
pub use keys::KeyStream;
pub use memory::MemoryBucket;
pub use prefix::PrefixBucket;
