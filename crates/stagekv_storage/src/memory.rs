//! In-memory bucket.

use crate::bucket::{KeyPrefixTraverser, KeyTraverser, ReadBucket, WriteBucket};
use crate::context::{CancelToken, Context};
use crate::error::{StoreError, StoreResult};
use crate::keys::KeyStream;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory key-value store backed by a hash map.
///
/// This bucket is suitable for:
/// - Unit tests
/// - Ephemeral stores that don't need persistence
/// - The backing store of a transaction wrapper in single-process use
///
/// # Thread Safety
///
/// This bucket is thread-safe and can be shared across threads.
///
/// # Key Enumeration
///
/// Enumeration copies the matching key names under the read lock and releases
/// the lock before the first key is produced, so a consumer that writes to
/// the bucket while enumerating cannot deadlock.
///
/// # Example
///
/// ```rust
/// use stagekv_storage::{Context, MemoryBucket, ReadBucket, WriteBucket};
///
/// let ctx = Context::background();
/// let bucket = MemoryBucket::new();
/// bucket.set(&ctx, "hello", b"world").unwrap();
/// assert_eq!(bucket.get(&ctx, "hello").unwrap(), b"world");
/// ```
#[derive(Debug, Default)]
pub struct MemoryBucket {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBucket {
    /// Creates a new empty bucket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bucket pre-populated with `entries`.
    #[must_use]
    pub fn with_entries(entries: HashMap<String, Vec<u8>>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the bucket holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns a copy of every entry.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Vec<u8>> {
        self.entries.read().clone()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl ReadBucket for MemoryBucket {
    fn has(&self, _ctx: &Context, key: &str) -> StoreResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }

    fn get(&self, _ctx: &Context, key: &str) -> StoreResult<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))
    }
}

impl WriteBucket for MemoryBucket {
    fn set(&self, _ctx: &Context, key: &str, value: &[u8]) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::invalid_key(key, "key is empty"));
        }
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, _ctx: &Context, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

impl KeyTraverser for MemoryBucket {
    fn keys(&self, ctx: &Context, cancel: &CancelToken) -> KeyStream<'_> {
        self.keys_with_prefix(ctx, "", cancel)
    }
}

impl KeyPrefixTraverser for MemoryBucket {
    fn keys_with_prefix(
        &self,
        _ctx: &Context,
        prefix: &str,
        cancel: &CancelToken,
    ) -> KeyStream<'_> {
        let keys: Vec<String> = self
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        KeyStream::new(keys.into_iter(), cancel)
    }
}
