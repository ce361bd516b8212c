// storage/src/backend/mod.rs

use crate::{PageId, Result, StorageError};
use std::sync::Arc;

/// The page allocator contract consumed by the tree engine.
///
/// A backend maps opaque nonzero ids to fixed-capacity byte slots. Pages
/// hold tree nodes, heads hold one root descriptor of [`crate::HEAD_SIZE`]
/// bytes each. The tree assumes nothing about physical layout beyond this
/// mapping and [`Backend::page_capacity`].
///
/// Reads fill a caller-provided buffer so callers can reuse pooled memory.
/// Writes shorter than the slot are zero-padded by the backend.
pub trait Backend: Send + Sync {
    /// Usable size of one page in bytes.
    fn page_capacity(&self) -> usize;

    fn alloc_page(&self) -> Result<PageId>;

    /// Fills `buf` with the page contents. `buf` must hold at least
    /// `page_capacity()` bytes.
    fn read_page(&self, id: PageId, buf: &mut [u8]) -> Result<()>;

    fn write_page(&self, id: PageId, data: &[u8]) -> Result<()>;

    fn free_page(&self, id: PageId) -> Result<()>;

    fn alloc_head(&self) -> Result<PageId>;

    /// Fills `buf` with the head record. `buf` must hold at least
    /// [`crate::HEAD_SIZE`] bytes.
    fn read_head(&self, id: PageId, buf: &mut [u8]) -> Result<()>;

    fn write_head(&self, id: PageId, data: &[u8]) -> Result<()>;

    fn free_head(&self, id: PageId) -> Result<()>;
}

/// Wraps a backend so that every mutating call fails with
/// [`StorageError::ReadOnly`] while reads still go through.
#[derive(Debug, Clone)]
pub struct ReadOnly<B> {
    inner: B,
}

impl<B: Backend> ReadOnly<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: Backend> Backend for ReadOnly<B> {
    fn page_capacity(&self) -> usize {
        self.inner.page_capacity()
    }

    fn alloc_page(&self) -> Result<PageId> {
        Err(StorageError::ReadOnly)
    }

    fn read_page(&self, id: PageId, buf: &mut [u8]) -> Result<()> {
        self.inner.read_page(id, buf)
    }

    fn write_page(&self, _id: PageId, _data: &[u8]) -> Result<()> {
        Err(StorageError::ReadOnly)
    }

    fn free_page(&self, _id: PageId) -> Result<()> {
        Err(StorageError::ReadOnly)
    }

    fn alloc_head(&self) -> Result<PageId> {
        Err(StorageError::ReadOnly)
    }

    fn read_head(&self, id: PageId, buf: &mut [u8]) -> Result<()> {
        self.inner.read_head(id, buf)
    }

    fn write_head(&self, _id: PageId, _data: &[u8]) -> Result<()> {
        Err(StorageError::ReadOnly)
    }

    fn free_head(&self, _id: PageId) -> Result<()> {
        Err(StorageError::ReadOnly)
    }
}

macro_rules! forward_backend {
    ($ty:ty) => {
        impl<B: Backend + ?Sized> Backend for $ty {
            fn page_capacity(&self) -> usize {
                (**self).page_capacity()
            }
            fn alloc_page(&self) -> Result<PageId> {
                (**self).alloc_page()
            }
            fn read_page(&self, id: PageId, buf: &mut [u8]) -> Result<()> {
                (**self).read_page(id, buf)
            }
            fn write_page(&self, id: PageId, data: &[u8]) -> Result<()> {
                (**self).write_page(id, data)
            }
            fn free_page(&self, id: PageId) -> Result<()> {
                (**self).free_page(id)
            }
            fn alloc_head(&self) -> Result<PageId> {
                (**self).alloc_head()
            }
            fn read_head(&self, id: PageId, buf: &mut [u8]) -> Result<()> {
                (**self).read_head(id, buf)
            }
            fn write_head(&self, id: PageId, data: &[u8]) -> Result<()> {
                (**self).write_head(id, data)
            }
            fn free_head(&self, id: PageId) -> Result<()> {
                (**self).free_head(id)
            }
        }
    };
}

forward_backend!(&B);
forward_backend!(Box<B>);
forward_backend!(Arc<B>);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBackend, HEAD_SIZE};

    #[test]
    fn test_read_only_rejects_mutation() {
        let backend = ReadOnly::new(MemoryBackend::new(64));

        assert!(matches!(backend.alloc_page(), Err(StorageError::ReadOnly)));
        assert!(matches!(backend.alloc_head(), Err(StorageError::ReadOnly)));
        assert!(matches!(
            backend.write_page(1, b"x"),
            Err(StorageError::ReadOnly)
        ));
        assert!(matches!(
            backend.write_head(1, b"x"),
            Err(StorageError::ReadOnly)
        ));
        assert!(matches!(backend.free_page(1), Err(StorageError::ReadOnly)));
        assert!(matches!(backend.free_head(1), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn test_read_only_still_reads() {
        let inner = MemoryBackend::new(64);
        let page = inner.alloc_page().unwrap();
        inner.write_page(page, b"page data").unwrap();
        let head = inner.alloc_head().unwrap();
        inner.write_head(head, b"head").unwrap();

        let backend = ReadOnly::new(inner);
        assert_eq!(backend.page_capacity(), 64);

        let mut buf = [0u8; 64];
        backend.read_page(page, &mut buf).unwrap();
        assert_eq!(&buf[..9], b"page data");

        let mut head_buf = [0u8; HEAD_SIZE];
        backend.read_head(head, &mut head_buf).unwrap();
        assert_eq!(&head_buf[..4], b"head");
    }

    #[test]
    fn test_forwarding_through_arc() {
        let backend = Arc::new(MemoryBackend::new(32));
        let shared: &dyn Backend = &backend;
        let id = shared.alloc_page().unwrap();
        shared.write_page(id, b"abc").unwrap();
        assert_eq!(backend.live_pages(), 1);
    }
}
