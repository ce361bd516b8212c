use super::{PageOutcome, Tree};
use crate::cancel::CancelToken;
use crate::codec::{Entry, Root};
use crate::error::GistResult;
use crate::policy::Policy;
use storage::{Backend, PageId};

/// Result of [`Tree::delete`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// The token fired before the walk finished. Changes made up to that
    /// point are kept; the untouched rest of the tree is intact.
    pub aborted: bool,
    /// Leaf entries removed.
    pub removed: usize,
}

struct DeleteWalk<'a, Q: ?Sized, F> {
    query: &'a Q,
    token: &'a CancelToken,
    confirm: F,
    outcome: DeleteOutcome,
}

impl<B: Backend, P: Policy> Tree<B, P> {
    /// Removes leaf entries that match `query` and that `confirm` accepts.
    ///
    /// Subtrees whose summary is not consistent with `query` are skipped.
    /// Emptied pages are freed, and afterwards any chain of single-child
    /// pages at the top of the tree is collapsed.
    ///
    /// Cancellation is not an error here. The walk stops, the remaining
    /// siblings of each open page are carried over verbatim and the outcome
    /// reports `aborted`.
    pub fn delete<F>(
        &self,
        object: PageId,
        query: &P::Query,
        token: &CancelToken,
        confirm: F,
    ) -> GistResult<DeleteOutcome>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut walk = DeleteWalk {
            query,
            token,
            confirm,
            outcome: DeleteOutcome::default(),
        };
        if token.is_cancelled() {
            walk.outcome.aborted = true;
            return Ok(walk.outcome);
        }

        let root = self.read_root(object)?;
        let Some(root_page) = root.root_page else {
            return Ok(walk.outcome);
        };

        let mut updated = match self.delete_from(root_page, &mut walk)? {
            PageOutcome::Removed => Root::empty(),
            PageOutcome::Unchanged(entry) => Root {
                root_page: entry.child,
                depth: root.depth,
            },
            PageOutcome::Split(entries) => {
                let (id, levels) = self.grow_root(entries)?;
                Root {
                    root_page: Some(id),
                    depth: root.depth + levels,
                }
            }
        };
        updated = self.collapse(updated)?;

        if updated != root {
            self.write_root(object, &updated)?;
        }
        if walk.outcome.aborted {
            log::warn!(
                "object {}: delete cancelled after removing {} entries",
                object,
                walk.outcome.removed
            );
        } else {
            log::debug!("object {}: removed {} entries", object, walk.outcome.removed);
        }
        Ok(walk.outcome)
    }

    fn delete_from<F>(
        &self,
        id: PageId,
        walk: &mut DeleteWalk<'_, P::Query, F>,
    ) -> GistResult<PageOutcome>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let page = self.load_page(id)?;
        let mut kept = Vec::with_capacity(page.len());
        let mut changed = false;

        let mut entries = page.into_iter();
        while let Some(entry) = entries.next() {
            if walk.token.is_cancelled() {
                walk.outcome.aborted = true;
                kept.push(entry);
                kept.extend(entries);
                break;
            }

            if !self.policy.consistent(&entry.value, walk.query) {
                kept.push(entry);
                continue;
            }

            match entry.child {
                Some(child) => {
                    let outcome = self.delete_from(child, walk)?;
                    if outcome != PageOutcome::Unchanged(entry.clone()) {
                        changed = true;
                    }
                    kept.extend(outcome.into_entries());
                }
                None if (walk.confirm)(&entry.value) => {
                    walk.outcome.removed += 1;
                    changed = true;
                }
                None => kept.push(entry),
            }
        }

        if !changed {
            return Ok(PageOutcome::Unchanged(Entry::internal(
                self.policy.union(&kept),
                id,
            )));
        }
        self.rewrite_page(id, kept)
    }

    /// Strips single-child internal pages off the top of the tree.
    fn collapse(&self, mut root: Root) -> GistResult<Root> {
        while let Some(id) = root.root_page {
            let mut entries = self.load_page(id)?;
            match entries.len() {
                0 => {
                    self.backend.free_page(id)?;
                    root = Root::empty();
                }
                1 if !entries[0].is_leaf() => {
                    self.backend.free_page(id)?;
                    root = Root {
                        root_page: entries.pop().and_then(|e| e.child),
                        depth: root.depth.saturating_sub(1),
                    };
                    log::debug!("collapsed root page {} at depth {}", id, root.depth);
                }
                _ => break,
            }
        }
        Ok(root)
    }
}
