//! Property-based test generators using proptest.
//!
//! Keys are drawn from a small alphabet so generated operation sequences
//! revisit the same keys often.

use proptest::prelude::*;
use stagekv_storage::{Context, StoreResult, WriteBucket};
use std::collections::HashMap;

/// Strategy for generating valid keys from a small keyspace.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-d]{1,3}").expect("Invalid regex")
}

/// Strategy for generating keys that share one of a few prefixes.
pub fn prefixed_key_strategy() -> impl Strategy<Value = String> {
    (prop::sample::select(vec!["app/", "sys/", "tmp/"]), key_strategy())
        .prop_map(|(prefix, key)| format!("{prefix}{key}"))
}

/// Strategy for generating values (arbitrary bytes, possibly empty).
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// A single operation against a transaction.
#[derive(Debug, Clone)]
pub enum TxnOperation {
    /// Set a key.
    Set {
        /// Key to write.
        key: String,
        /// Value to write.
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Key to delete.
        key: String,
    },
    /// Read a key.
    Get {
        /// Key to read.
        key: String,
    },
    /// Commit staged operations.
    Commit,
    /// Discard staged operations.
    Rollback,
}

/// Strategy for generating transaction operations.
pub fn txn_operation_strategy() -> impl Strategy<Value = TxnOperation> {
    prop_oneof![
        4 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| TxnOperation::Set { key, value }),
        2 => key_strategy().prop_map(|key| TxnOperation::Delete { key }),
        3 => key_strategy().prop_map(|key| TxnOperation::Get { key }),
        1 => Just(TxnOperation::Commit),
        1 => Just(TxnOperation::Rollback),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<TxnOperation>> {
    prop::collection::vec(txn_operation_strategy(), min_ops..max_ops)
}

/// Strategy for generating an initial store content.
pub fn entries_strategy(max_len: usize) -> impl Strategy<Value = HashMap<String, Vec<u8>>> {
    prop::collection::hash_map(key_strategy(), value_strategy(), 0..max_len)
}

/// Reference model of a transaction over a plain map.
///
/// `committed` mirrors the backing store and `staged` mirrors pending
/// operations, with `None` for a staged delete.
#[derive(Debug, Clone, Default)]
pub struct TxnModel {
    /// Contents of the backing store.
    pub committed: HashMap<String, Vec<u8>>,
    /// Pending operations.
    pub staged: HashMap<String, Option<Vec<u8>>>,
}

impl TxnModel {
    /// Creates a model over `committed`.
    pub fn new(committed: HashMap<String, Vec<u8>>) -> Self {
        Self {
            committed,
            staged: HashMap::new(),
        }
    }

    /// Returns the value the transaction should observe for `key`.
    pub fn get(&self, key: &str) -> Option<&Vec<u8>> {
        match self.staged.get(key) {
            Some(staged) => staged.as_ref(),
            None => self.committed.get(key),
        }
    }

    /// Applies `op` to the model.
    pub fn apply(&mut self, op: &TxnOperation) {
        match op {
            TxnOperation::Set { key, value } => {
                self.staged.insert(key.clone(), Some(value.clone()));
            }
            TxnOperation::Delete { key } => {
                self.staged.insert(key.clone(), None);
            }
            TxnOperation::Get { .. } => {}
            TxnOperation::Commit => {
                for (key, staged) in self.staged.drain() {
                    match staged {
                        Some(value) => self.committed.insert(key, value),
                        None => self.committed.remove(&key),
                    };
                }
            }
            TxnOperation::Rollback => self.staged.clear(),
        }
    }

    /// Returns every key visible to the transaction.
    pub fn visible_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .committed
            .keys()
            .filter(|k| !self.staged.contains_key(*k))
            .cloned()
            .chain(
                self.staged
                    .iter()
                    .filter(|(_, v)| v.is_some())
                    .map(|(k, _)| k.clone()),
            )
            .collect();
        keys.sort();
        keys
    }
}

/// Writes every entry of `entries` to `bucket`.
pub fn seed<B: WriteBucket + ?Sized>(
    ctx: &Context,
    bucket: &B,
    entries: &HashMap<String, Vec<u8>>,
) -> StoreResult<()> {
    for (key, value) in entries {
        bucket.set(ctx, key, value)?;
    }
    Ok(())
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
