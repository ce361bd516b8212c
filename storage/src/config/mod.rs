//! Configuration for opening a storage backend.

use crate::{Result, StorageError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest page that still holds a page count plus one empty entry.
pub const MIN_PAGE_SIZE: usize = 32;

/// Options for [`crate::open`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Page capacity in bytes. Only used when creating a new file; an
    /// existing file keeps the size it was created with.
    pub page_size: usize,

    /// Backing file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,

    /// Reject every mutating call with `StorageError::ReadOnly`.
    pub read_only: bool,

    /// Call `sync_data` after every page or head write.
    pub sync_on_write: bool,

    /// Verify slot checksums on read.
    pub verify_checksums: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            path: None,
            read_only: false,
            sync_on_write: false,
            verify_checksums: true,
        }
    }
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration file (format picked from the extension) and
    /// layers `GIST_*` environment variables on top of it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("GIST").try_parsing(true))
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| StorageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(StorageError::Config(format!(
                "page_size {} is below the minimum of {}",
                self.page_size, MIN_PAGE_SIZE
            )));
        }
        if self.page_size > u32::MAX as usize {
            return Err(StorageError::Config(format!(
                "page_size {} does not fit the on-disk header",
                self.page_size
            )));
        }
        Ok(())
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }
}
