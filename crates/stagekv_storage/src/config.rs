//! File bucket configuration.

/// Default name of the subdirectory used for in-flight writes.
pub const DEFAULT_STAGING_DIR: &str = ".staging";

/// Configuration for opening a [`crate::FileBucket`].
#[derive(Debug, Clone)]
pub struct FileBucketConfig {
    /// Whether to create the bucket directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync every value file before it is renamed into place.
    pub sync_on_write: bool,

    /// Name of the subdirectory holding temp files during writes.
    ///
    /// This name cannot be used as a key.
    pub staging_dir: String,
}

impl Default for FileBucketConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: false,
            staging_dir: DEFAULT_STAGING_DIR.to_string(),
        }
    }
}

impl FileBucketConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync each value file.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the staging subdirectory name.
    #[must_use]
    pub fn staging_dir(mut self, name: impl Into<String>) -> Self {
        self.staging_dir = name.into();
        self
    }
}
