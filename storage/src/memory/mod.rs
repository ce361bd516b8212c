// storage/src/memory/mod.rs

use crate::backend::Backend;
use crate::{PageId, Result, StorageError, HEAD_SIZE};
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-process backend. Ids are handed out from one monotonically growing
/// counter and never reused, so a stale id is always detectable.
pub struct MemoryBackend {
    page_size: usize,
    inner: Mutex<MemoryState>,
}

struct MemoryState {
    next_id: PageId,
    pages: HashMap<PageId, Box<[u8]>>,
    heads: HashMap<PageId, [u8; HEAD_SIZE]>,
}

impl MemoryBackend {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            inner: Mutex::new(MemoryState {
                next_id: 1,
                pages: HashMap::new(),
                heads: HashMap::new(),
            }),
        }
    }

    /// Number of allocated and not yet freed pages.
    pub fn live_pages(&self) -> usize {
        self.inner.lock().pages.len()
    }

    /// Number of allocated and not yet freed heads.
    pub fn live_heads(&self) -> usize {
        self.inner.lock().heads.len()
    }

    fn check_len(&self, needed: usize, available: usize) -> Result<()> {
        if needed > available {
            return Err(StorageError::TooShort { needed, available });
        }
        Ok(())
    }
}

impl Backend for MemoryBackend {
    fn page_capacity(&self) -> usize {
        self.page_size
    }

    fn alloc_page(&self) -> Result<PageId> {
        let mut state = self.inner.lock();
        let id = state.next_id;
        state.next_id += 1;
        state
            .pages
            .insert(id, vec![0u8; self.page_size].into_boxed_slice());
        log::trace!("allocated page {}", id);
        Ok(id)
    }

    fn read_page(&self, id: PageId, buf: &mut [u8]) -> Result<()> {
        self.check_len(self.page_size, buf.len())?;
        let state = self.inner.lock();
        let page = state.pages.get(&id).ok_or(StorageError::PageNotFound(id))?;
        buf[..self.page_size].copy_from_slice(page);
        Ok(())
    }

    fn write_page(&self, id: PageId, data: &[u8]) -> Result<()> {
        self.check_len(data.len(), self.page_size)?;
        let mut state = self.inner.lock();
        let page = state
            .pages
            .get_mut(&id)
            .ok_or(StorageError::PageNotFound(id))?;
        page[..data.len()].copy_from_slice(data);
        page[data.len()..].fill(0);
        Ok(())
    }

    fn free_page(&self, id: PageId) -> Result<()> {
        let mut state = self.inner.lock();
        state
            .pages
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::PageNotFound(id))
    }

    fn alloc_head(&self) -> Result<PageId> {
        let mut state = self.inner.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.heads.insert(id, [0u8; HEAD_SIZE]);
        Ok(id)
    }

    fn read_head(&self, id: PageId, buf: &mut [u8]) -> Result<()> {
        self.check_len(HEAD_SIZE, buf.len())?;
        let state = self.inner.lock();
        let head = state.heads.get(&id).ok_or(StorageError::PageNotFound(id))?;
        buf[..HEAD_SIZE].copy_from_slice(head);
        Ok(())
    }

    fn write_head(&self, id: PageId, data: &[u8]) -> Result<()> {
        self.check_len(data.len(), HEAD_SIZE)?;
        let mut state = self.inner.lock();
        let head = state
            .heads
            .get_mut(&id)
            .ok_or(StorageError::PageNotFound(id))?;
        head[..data.len()].copy_from_slice(data);
        head[data.len()..].fill(0);
        Ok(())
    }

    fn free_head(&self, id: PageId) -> Result<()> {
        let mut state = self.inner.lock();
        state
            .heads
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::PageNotFound(id))
    }
}
