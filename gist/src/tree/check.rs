use super::Tree;
use crate::codec::{encoded_len, page_kind, PageKind};
use crate::error::{GistError, GistResult};
use crate::policy::Policy;
use std::collections::HashSet;
use storage::{Backend, PageId};

/// Shape of one object's tree, as found by [`Tree::check`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Levels from root to the deepest leaf page.
    pub depth: u32,
    pub pages: usize,
    pub leaf_entries: usize,
    pub internal_entries: usize,
}

impl<B: Backend, P: Policy> Tree<B, P> {
    /// Walks the whole tree and verifies its structure.
    ///
    /// Every page must be non-empty, within capacity and homogeneous, and
    /// referenced only once. Every internal entry must carry the policy's
    /// union of its child page, and the descriptor's depth must match the
    /// deepest leaf. The first violation is reported as
    /// [`GistError::Corrupt`].
    pub fn check(&self, object: PageId) -> GistResult<TreeStats> {
        let root = self.read_root(object)?;
        let mut stats = TreeStats::default();

        let Some(page) = root.root_page else {
            if root.depth != 0 {
                return Err(GistError::corrupt(
                    object,
                    format!("empty tree with depth {}", root.depth),
                ));
            }
            return Ok(stats);
        };

        let mut seen = HashSet::new();
        self.check_page(page, 1, &mut seen, &mut stats)?;

        if stats.depth != root.depth {
            return Err(GistError::corrupt(
                object,
                format!(
                    "descriptor depth {} but deepest leaf at level {}",
                    root.depth, stats.depth
                ),
            ));
        }
        Ok(stats)
    }

    fn check_page(
        &self,
        id: PageId,
        level: u32,
        seen: &mut HashSet<PageId>,
        stats: &mut TreeStats,
    ) -> GistResult<()> {
        if !seen.insert(id) {
            return Err(GistError::corrupt(id, "page referenced more than once"));
        }

        let entries = self.load_page(id)?;
        stats.pages += 1;

        let size = encoded_len(&entries);
        if size > self.backend.page_capacity() {
            return Err(GistError::corrupt(
                id,
                format!("{} bytes exceed page capacity", size),
            ));
        }

        match page_kind(&entries) {
            PageKind::Empty => return Err(GistError::corrupt(id, "empty page in tree")),
            PageKind::Mixed => {
                return Err(GistError::corrupt(id, "mixed leaf and internal entries"))
            }
            PageKind::Leaf => {
                stats.leaf_entries += entries.len();
                stats.depth = stats.depth.max(level);
            }
            PageKind::Internal => {
                stats.internal_entries += entries.len();
                for entry in &entries {
                    let Some(child) = entry.child else { continue };
                    let summary = self.policy.union(&self.load_page(child)?);
                    if summary != entry.value {
                        return Err(GistError::corrupt(
                            id,
                            format!("stale summary for child page {}", child),
                        ));
                    }
                    self.check_page(child, level + 1, seen, stats)?;
                }
            }
        }
        Ok(())
    }
}
