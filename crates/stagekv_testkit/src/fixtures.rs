//! Test fixtures for buckets.
//!
//! Provides temporary file buckets that clean up after themselves and a
//! bucket that fails writes on demand.

use parking_lot::Mutex;
use stagekv_storage::{
    CancelToken, Context, FileBucket, FileBucketConfig, KeyPrefixTraverser, KeyStream,
    KeyTraverser, MemoryBucket, ReadBucket, StoreError, StoreResult, WriteBucket,
};
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;

/// A file bucket in a temporary directory, removed on drop.
pub struct TempFileBucket {
    /// The bucket instance.
    pub bucket: FileBucket,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempFileBucket {
    /// Creates a file bucket in a fresh temporary directory.
    pub fn new() -> Self {
        Self::with_config(FileBucketConfig::default())
    }

    /// Creates a file bucket with `config` in a fresh temporary directory.
    pub fn with_config(config: FileBucketConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let bucket = FileBucket::open_with_config(&temp_dir.path().join("bucket"), config)
            .expect("Failed to open file bucket");
        Self {
            bucket,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the directory holding the bucket's value files.
    pub fn path(&self) -> &Path {
        self.bucket.path()
    }
}

impl Default for TempFileBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TempFileBucket {
    type Target = FileBucket;

    fn deref(&self) -> &Self::Target {
        &self.bucket
    }
}

/// Runs `f` against a temporary file bucket.
pub fn with_temp_file_bucket<F, R>(f: F) -> R
where
    F: FnOnce(&FileBucket) -> R,
{
    let temp = TempFileBucket::new();
    f(&temp.bucket)
}

/// An in-memory bucket whose writes to selected keys fail.
///
/// Reads and enumeration always succeed. A key marked with
/// [`FaultyBucket::fail_on`] rejects `set` and `delete` with a backend error
/// until it is healed.
#[derive(Debug, Default)]
pub struct FaultyBucket {
    inner: MemoryBucket,
    failing: Mutex<HashSet<String>>,
}

impl FaultyBucket {
    /// Creates an empty bucket with no failing keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes writes to `key` fail.
    pub fn fail_on(&self, key: impl Into<String>) {
        self.failing.lock().insert(key.into());
    }

    /// Makes writes to `key` succeed again.
    pub fn heal(&self, key: &str) {
        self.failing.lock().remove(key);
    }

    /// Makes writes to every key succeed again.
    pub fn heal_all(&self) {
        self.failing.lock().clear();
    }

    /// Returns the underlying memory bucket.
    pub fn inner(&self) -> &MemoryBucket {
        &self.inner
    }

    fn check_write(&self, key: &str) -> StoreResult<()> {
        if self.failing.lock().contains(key) {
            return Err(StoreError::backend(format!("injected write failure for {key}")));
        }
        Ok(())
    }
}

impl ReadBucket for FaultyBucket {
    fn has(&self, ctx: &Context, key: &str) -> StoreResult<bool> {
        self.inner.has(ctx, key)
    }

    fn get(&self, ctx: &Context, key: &str) -> StoreResult<Vec<u8>> {
        self.inner.get(ctx, key)
    }
}

impl WriteBucket for FaultyBucket {
    fn set(&self, ctx: &Context, key: &str, value: &[u8]) -> StoreResult<()> {
        self.check_write(key)?;
        self.inner.set(ctx, key, value)
    }

    fn delete(&self, ctx: &Context, key: &str) -> StoreResult<()> {
        self.check_write(key)?;
        self.inner.delete(ctx, key)
    }
}

impl KeyTraverser for FaultyBucket {
    fn keys(&self, ctx: &Context, cancel: &CancelToken) -> KeyStream<'_> {
        self.inner.keys(ctx, cancel)
    }
}

impl KeyPrefixTraverser for FaultyBucket {
    fn keys_with_prefix(
        &self,
        ctx: &Context,
        prefix: &str,
        cancel: &CancelToken,
    ) -> KeyStream<'_> {
        self.inner.keys_with_prefix(ctx, prefix, cancel)
    }
}
