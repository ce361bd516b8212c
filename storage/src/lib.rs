//! Storage backends for the GiST index
//!
//! This crate provides the page-id to bytes layer the tree engine is built
//! on: the [`Backend`] contract, a read-only wrapper, an in-memory backend
//! and a file-backed slot allocator.

pub mod backend;
pub mod config;
pub mod file;
pub mod memory;

pub use backend::{Backend, ReadOnly};
pub use config::StorageConfig;
pub use file::PageFile;
pub use memory::MemoryBackend;

use thiserror::Error;

/// Opaque identifier of a page or head record. `0` is never handed out.
pub type PageId = u64;

/// Size of a head record (the serialized root descriptor).
pub const HEAD_SIZE: usize = 16;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Backend is read-only")]
    ReadOnly,

    #[error("Buffer too short: need {needed} bytes, have {available}")]
    TooShort { needed: usize, available: usize },

    #[error("Checksum mismatch for page {0}")]
    ChecksumMismatch(PageId),

    #[error("Invalid page id {0}")]
    InvalidPageId(PageId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Opens the backend described by `config`.
///
/// Without a path an empty [`MemoryBackend`] is returned. With a path the
/// file is opened, or created when missing. `read_only` wraps the result in
/// [`ReadOnly`].
pub fn open(config: &StorageConfig) -> Result<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match &config.path {
        None => Box::new(MemoryBackend::new(config.page_size)),
        Some(path) if path.exists() => Box::new(PageFile::open(path, config)?),
        Some(path) => Box::new(PageFile::create_new(path, config)?),
    };

    if config.read_only {
        log::debug!("opening storage read-only");
        return Ok(Box::new(ReadOnly::new(backend)));
    }
    Ok(backend)
}
