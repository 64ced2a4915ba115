//! File-per-key bucket for persistent storage.

use crate::bucket::{KeyPrefixTraverser, KeyTraverser, ReadBucket, WriteBucket};
use crate::config::FileBucketConfig;
use crate::context::{CancelToken, Context};
use crate::error::{StoreError, StoreResult};
use crate::keys::KeyStream;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// A persistent bucket storing each key as one file in a flat directory.
///
/// Data survives process restarts.
///
/// # Durability
///
/// - Values are written to a temp file in the staging subdirectory and then
///   renamed over the key's file, so readers never see a half-written value.
/// - With [`FileBucketConfig::sync_on_write`] the temp file is fsynced before
///   the rename.
///
/// # Keys
///
/// Keys become file names, so they must be non-empty and may not contain
/// path separators or NUL, be `.` or `..`, or equal the staging directory
/// name. Such keys are rejected with [`StoreError::InvalidKey`].
///
/// # Example
///
/// ```no_run
/// use stagekv_storage::{Context, FileBucket, ReadBucket, WriteBucket};
/// use std::path::Path;
///
/// let ctx = Context::background();
/// let bucket = FileBucket::open(Path::new("data")).unwrap();
/// bucket.set(&ctx, "greeting", b"hello").unwrap();
/// assert_eq!(bucket.get(&ctx, "greeting").unwrap(), b"hello");
/// ```
#[derive(Debug)]
pub struct FileBucket {
    dir: PathBuf,
    staging: PathBuf,
    config: FileBucketConfig,
    next_temp: AtomicU64,
}

impl FileBucket {
    /// Opens or creates a bucket in `dir` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or opened.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        Self::open_with_config(dir, FileBucketConfig::default())
    }

    /// Opens a bucket in `dir` with `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory is missing and
    /// `create_if_missing` is false, or if it cannot be created.
    pub fn open_with_config(dir: &Path, config: FileBucketConfig) -> StoreResult<Self> {
        if config.create_if_missing {
            fs::create_dir_all(dir)?;
        } else if !dir.is_dir() {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("bucket directory {} does not exist", dir.display()),
            )));
        }

        let staging = dir.join(&config.staging_dir);
        fs::create_dir_all(&staging)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            staging,
            config,
            next_temp: AtomicU64::new(0),
        })
    }

    /// Returns the bucket directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path for `key` after validating it.
    fn key_path(&self, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() {
            return Err(StoreError::invalid_key(key, "key is empty"));
        }
        if key == "." || key == ".." {
            return Err(StoreError::invalid_key(key, "key is a relative path component"));
        }
        if key.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
            return Err(StoreError::invalid_key(key, "key contains a path separator or NUL"));
        }
        if key == self.config.staging_dir {
            return Err(StoreError::invalid_key(key, "key is reserved for staging"));
        }
        Ok(self.dir.join(key))
    }

    fn temp_path(&self) -> PathBuf {
        let n = self.next_temp.fetch_add(1, Ordering::Relaxed);
        self.staging
            .join(format!("{}-{}.tmp", std::process::id(), n))
    }

    fn write_temp(&self, temp: &Path, value: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp)?;
        file.write_all(value)?;
        if self.config.sync_on_write {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl ReadBucket for FileBucket {
    fn has(&self, ctx: &Context, key: &str) -> StoreResult<bool> {
        ctx.check()?;
        let path = self.key_path(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, ctx: &Context, key: &str) -> StoreResult<Vec<u8>> {
        ctx.check()?;
        let path = self.key_path(key)?;
        match fs::read(&path) {
            Ok(value) => Ok(value),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }
}

impl WriteBucket for FileBucket {
    fn set(&self, ctx: &Context, key: &str, value: &[u8]) -> StoreResult<()> {
        ctx.check()?;
        let path = self.key_path(key)?;
        let temp = self.temp_path();

        let result = self
            .write_temp(&temp, value)
            .and_then(|()| fs::rename(&temp, &path));
        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&temp) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(temp = %temp.display(), error = %cleanup, "failed to remove temp file");
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn delete(&self, ctx: &Context, key: &str) -> StoreResult<()> {
        ctx.check()?;
        let path = self.key_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyTraverser for FileBucket {
    fn keys(&self, ctx: &Context, cancel: &CancelToken) -> KeyStream<'_> {
        self.keys_with_prefix(ctx, "", cancel)
    }
}

impl KeyPrefixTraverser for FileBucket {
    fn keys_with_prefix(
        &self,
        ctx: &Context,
        prefix: &str,
        cancel: &CancelToken,
    ) -> KeyStream<'_> {
        if ctx.check().is_err() {
            return KeyStream::empty();
        }
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "failed to read bucket directory");
                return KeyStream::empty();
            }
        };

        let prefix = prefix.to_string();
        let keys = entries
            .map_while(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "stopping key enumeration on directory error");
                    None
                }
            })
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(move |name| name.starts_with(prefix.as_str()));
        KeyStream::new(keys, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{all_keys, all_keys_with_prefix};
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bucket");

        let bucket = FileBucket::open(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(bucket.path(), path);
        assert!(all_keys(&Context::background(), &bucket).is_empty());
    }

    #[test]
    fn file_missing_dir_without_create_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent");

        let config = FileBucketConfig::new().create_if_missing(false);
        assert!(FileBucket::open_with_config(&path, config).is_err());
    }

    #[test]
    fn file_set_and_get() {
        let dir = tempdir().unwrap();
        let ctx = Context::background();
        let bucket = FileBucket::open(dir.path()).unwrap();

        bucket.set(&ctx, "hello", b"world").unwrap();
        assert!(bucket.has(&ctx, "hello").unwrap());
        assert_eq!(bucket.get(&ctx, "hello").unwrap(), b"world");

        bucket.set(&ctx, "hello", b"again").unwrap();
        assert_eq!(bucket.get(&ctx, "hello").unwrap(), b"again");
    }

    #[test]
    fn file_get_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let bucket = FileBucket::open(dir.path()).unwrap();
        let err = bucket.get(&Context::background(), "nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn file_delete_missing_is_ok() {
        let dir = tempdir().unwrap();
        let ctx = Context::background();
        let bucket = FileBucket::open(dir.path()).unwrap();

        bucket.delete(&ctx, "nope").unwrap();
        bucket.set(&ctx, "k", b"v").unwrap();
        bucket.delete(&ctx, "k").unwrap();
        assert!(!bucket.has(&ctx, "k").unwrap());
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let ctx = Context::background();

        {
            let config = FileBucketConfig::new().sync_on_write(true);
            let bucket = FileBucket::open_with_config(dir.path(), config).unwrap();
            bucket.set(&ctx, "durable", b"data").unwrap();
        }

        {
            let bucket = FileBucket::open(dir.path()).unwrap();
            assert_eq!(bucket.get(&ctx, "durable").unwrap(), b"data");
        }
    }

    #[test]
    fn file_rejects_unsafe_keys() {
        let dir = tempdir().unwrap();
        let ctx = Context::background();
        let bucket = FileBucket::open(dir.path()).unwrap();

        for key in ["", ".", "..", "a/b", "a\\b", ".staging"] {
            let result = bucket.set(&ctx, key, b"v");
            assert!(
                matches!(result, Err(StoreError::InvalidKey { .. })),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn file_keys_skip_staging_dir() {
        let dir = tempdir().unwrap();
        let ctx = Context::background();
        let bucket = FileBucket::open(dir.path()).unwrap();
        for key in ["hello", "help", "foo"] {
            bucket.set(&ctx, key, b"x").unwrap();
        }

        let mut keys = all_keys(&ctx, &bucket);
        keys.sort();
        assert_eq!(keys, vec!["foo", "hello", "help"]);

        let mut keys = all_keys_with_prefix(&ctx, &bucket, "hel");
        keys.sort();
        assert_eq!(keys, vec!["hello", "help"]);
    }

    #[test]
    fn file_cancelled_context_fails() {
        let dir = tempdir().unwrap();
        let bucket = FileBucket::open(dir.path()).unwrap();
        let cancel = CancelToken::new();
        let ctx = Context::with_cancel(cancel.clone());
        cancel.cancel();

        let err = bucket.set(&ctx, "k", b"v").unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(bucket.keys(&ctx, &CancelToken::new()).count(), 0);
    }
}
