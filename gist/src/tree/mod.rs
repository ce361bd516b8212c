//! The tree engine.
//!
//! A [`Tree`] holds no persistent state of its own: every object's tree
//! lives in the backend, reachable from a head record holding its
//! [`Root`]. The engine provides no locking. Callers must serialize insert
//! and delete on the same object; concurrent searches over a stable tree
//! are fine.

mod check;
mod delete;
mod insert;
mod search;

pub use check::TreeStats;
pub use delete::DeleteOutcome;

use crate::codec::{decode_page, encode_page, page_kind, Entry, PageKind, Root, ROOT_SIZE};
use crate::config::TreeConfig;
use crate::error::{GistError, GistResult};
use crate::policy::Policy;
use crate::pool::BufferPool;
use storage::{Backend, PageId};

/// What became of a page after it was rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PageOutcome {
    /// The page emptied and was freed.
    Removed,
    /// The page still fits in place; the entry carries its fresh summary.
    Unchanged(Entry),
    /// The page was cut into several; the first reuses the original id.
    Split(Vec<Entry>),
}

impl PageOutcome {
    /// Entries that replace the parent's pointer to this page.
    pub(crate) fn into_entries(self) -> Vec<Entry> {
        match self {
            PageOutcome::Removed => Vec::new(),
            PageOutcome::Unchanged(entry) => vec![entry],
            PageOutcome::Split(entries) => entries,
        }
    }
}

/// A generalized search tree over `backend`, with semantics from `policy`.
pub struct Tree<B, P> {
    backend: B,
    policy: P,
    pool: BufferPool,
}

impl<B: Backend, P: Policy> Tree<B, P> {
    pub fn new(backend: B, policy: P) -> Self {
        Self::with_config(backend, policy, TreeConfig::default())
    }

    pub fn with_config(backend: B, policy: P, config: TreeConfig) -> Self {
        Self {
            backend,
            policy,
            pool: BufferPool::new(config.pool_max_idle_per_size),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Allocates a head record holding an empty tree and returns its id,
    /// which names the object in every other call.
    pub fn create_object(&self) -> GistResult<PageId> {
        let id = self.backend.alloc_head()?;
        self.write_root(id, &Root::empty())?;
        log::debug!("created object {}", id);
        Ok(id)
    }

    /// Reads an object's root descriptor.
    pub fn root(&self, object: PageId) -> GistResult<Root> {
        self.read_root(object)
    }

    /// Frees every page of the object's tree, then its head record.
    pub fn drop_object(&self, object: PageId) -> GistResult<()> {
        let root = self.read_root(object)?;
        if let Some(page) = root.root_page {
            self.free_subtree(page)?;
        }
        self.backend.free_head(object)?;
        log::debug!("dropped object {}", object);
        Ok(())
    }

    fn free_subtree(&self, id: PageId) -> GistResult<()> {
        for entry in self.load_page(id)? {
            if let Some(child) = entry.child {
                self.free_subtree(child)?;
            }
        }
        self.backend.free_page(id)?;
        Ok(())
    }

    pub(crate) fn read_root(&self, object: PageId) -> GistResult<Root> {
        let mut buf = self.pool.acquire(ROOT_SIZE);
        self.backend.read_head(object, &mut buf)?;
        Root::decode(&buf)
    }

    pub(crate) fn write_root(&self, object: PageId, root: &Root) -> GistResult<()> {
        let mut buf = self.pool.acquire(ROOT_SIZE);
        root.encode(&mut buf)?;
        self.backend.write_head(object, &buf)?;
        Ok(())
    }

    /// Reads and decodes a page, rejecting pages that mix leaf and internal
    /// entries.
    pub(crate) fn load_page(&self, id: PageId) -> GistResult<Vec<Entry>> {
        let mut buf = self.pool.acquire(self.backend.page_capacity());
        self.backend.read_page(id, &mut buf)?;
        let entries =
            decode_page(&buf).map_err(|e| GistError::corrupt(id, format!("undecodable: {}", e)))?;

        if page_kind(&entries) == PageKind::Mixed {
            return Err(GistError::corrupt(id, "mixed leaf and internal entries"));
        }
        log::trace!("read page {} ({} entries)", id, entries.len());
        Ok(entries)
    }

    pub(crate) fn store_page(&self, id: PageId, entries: &[Entry]) -> GistResult<()> {
        let mut buf = self.pool.acquire(self.backend.page_capacity());
        let used = encode_page(entries, &mut buf)?;
        self.backend.write_page(id, &buf[..used])?;
        log::trace!("wrote page {} ({} entries, {} bytes)", id, entries.len(), used);
        Ok(())
    }

    /// Writes `entries` back as page `id`, splitting as the policy directs.
    ///
    /// Entries are sorted once, then `first_split` is applied repeatedly to
    /// the remaining tail. The first chunk keeps `id`; later chunks get
    /// fresh pages. An empty set frees the page.
    pub(crate) fn rewrite_page(&self, id: PageId, mut entries: Vec<Entry>) -> GistResult<PageOutcome> {
        if entries.is_empty() {
            self.backend.free_page(id)?;
            log::debug!("freed empty page {}", id);
            return Ok(PageOutcome::Removed);
        }

        self.policy.sort(&mut entries);
        let capacity = self.backend.page_capacity();

        let mut replacements = Vec::with_capacity(1);
        let mut rest = entries;
        let mut target = Some(id);
        while !rest.is_empty() {
            let (head, tail) = self.policy.first_split(rest, capacity);
            if head.is_empty() {
                return Err(GistError::Policy(format!(
                    "first_split returned an empty head with {} entries left",
                    tail.len()
                )));
            }

            let page = match target.take() {
                Some(page) => page,
                None => self.backend.alloc_page()?,
            };
            self.store_page(page, &head)?;
            replacements.push(Entry::internal(self.policy.union(&head), page));
            rest = tail;
        }

        if replacements.len() == 1 {
            return Ok(PageOutcome::Unchanged(replacements.remove(0)));
        }
        log::debug!("split page {} into {} pages", id, replacements.len());
        Ok(PageOutcome::Split(replacements))
    }

    /// Builds new root levels above `entries` until one page holds them.
    /// Returns the new root page and how many levels were added.
    pub(crate) fn grow_root(&self, mut entries: Vec<Entry>) -> GistResult<(PageId, u32)> {
        let mut levels = 0;
        loop {
            let entries_len = entries.len();
            let id = self.backend.alloc_page()?;
            levels += 1;
            match self.rewrite_page(id, entries)? {
                PageOutcome::Unchanged(_) => return Ok((id, levels)),
                PageOutcome::Split(more) if more.len() < entries_len => entries = more,
                PageOutcome::Split(more) => {
                    return Err(GistError::Policy(format!(
                        "{} summaries do not fit fewer pages than {}",
                        more.len(),
                        entries_len
                    )))
                }
                PageOutcome::Removed => {
                    return Err(GistError::corrupt(id, "new root level has no entries"))
                }
            }
        }
    }
}
