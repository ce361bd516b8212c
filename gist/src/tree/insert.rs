use super::{PageOutcome, Tree};
use crate::codec::{Entry, Root, ENTRY_OVERHEAD, PAGE_HEADER_SIZE};
use crate::error::{GistError, GistResult};
use crate::policy::Policy;
use storage::{Backend, PageId};

impl<B: Backend, P: Policy> Tree<B, P> {
    /// Adds `item` as a leaf value of the object's tree.
    ///
    /// The item descends along the minimum-penalty child at every internal
    /// page. Overfull pages are split on the way back up, and a split that
    /// reaches the root adds a level.
    pub fn insert(&self, object: PageId, item: &[u8]) -> GistResult<()> {
        let needed = PAGE_HEADER_SIZE + ENTRY_OVERHEAD + item.len();
        let capacity = self.backend.page_capacity();
        if needed > capacity {
            return Err(GistError::TooShort {
                needed,
                available: capacity,
            });
        }

        let root = self.read_root(object)?;
        let Some(root_page) = root.root_page else {
            let id = self.backend.alloc_page()?;
            self.store_page(id, &[Entry::leaf(item)])?;
            self.write_root(
                object,
                &Root {
                    root_page: Some(id),
                    depth: 1,
                },
            )?;
            log::debug!("object {}: created root leaf {}", object, id);
            return Ok(());
        };

        let updated = match self.insert_into(root_page, item)? {
            PageOutcome::Unchanged(entry) => Root {
                root_page: entry.child,
                depth: root.depth,
            },
            PageOutcome::Split(entries) => {
                let (id, levels) = self.grow_root(entries)?;
                log::debug!(
                    "object {}: root split, new root {} at depth {}",
                    object,
                    id,
                    root.depth + levels
                );
                Root {
                    root_page: Some(id),
                    depth: root.depth + levels,
                }
            }
            PageOutcome::Removed => Root::empty(),
        };

        if updated != root {
            self.write_root(object, &updated)?;
        }
        Ok(())
    }

    fn insert_into(&self, id: PageId, item: &[u8]) -> GistResult<PageOutcome> {
        let mut entries = self.load_page(id)?;

        match choose_subtree(&self.policy, &entries, item) {
            None => entries.push(Entry::leaf(item)),
            Some(slot) => {
                let child = entries[slot]
                    .child
                    .ok_or_else(|| GistError::corrupt(id, "leaf entry chosen for descent"))?;
                let outcome = self.insert_into(child, item)?;
                entries.splice(slot..=slot, outcome.into_entries());
            }
        }

        self.rewrite_page(id, entries)
    }
}

/// Index of the internal entry with the lowest penalty for `item`, or
/// `None` for a leaf page. Ties resolve to the earliest entry.
fn choose_subtree<P: Policy>(policy: &P, entries: &[Entry], item: &[u8]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, entry) in entries.iter().enumerate() {
        if entry.is_leaf() {
            return None;
        }
        let cost = policy.penalty(&entry.value, item);
        match best {
            Some((_, lowest)) if !(cost < lowest) => {}
            _ => best = Some((i, cost)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Penalty is the first byte of the summary; everything else is inert.
    struct FirstByte;

    impl Policy for FirstByte {
        type Query = ();

        fn consistent(&self, _value: &[u8], _query: &()) -> bool {
            true
        }
        fn union(&self, _entries: &[Entry]) -> Vec<u8> {
            Vec::new()
        }
        fn penalty(&self, summary: &[u8], _item: &[u8]) -> f64 {
            summary[0] as f64
        }
        fn first_split(&self, entries: Vec<Entry>, _max: usize) -> (Vec<Entry>, Vec<Entry>) {
            (entries, Vec::new())
        }
        fn sort(&self, _entries: &mut [Entry]) {}
    }

    #[test]
    fn test_choose_subtree_picks_lowest_penalty() {
        let entries = vec![
            Entry::internal(vec![5], 1),
            Entry::internal(vec![2], 2),
            Entry::internal(vec![7], 3),
        ];
        assert_eq!(choose_subtree(&FirstByte, &entries, b"x"), Some(1));
    }

    #[test]
    fn test_choose_subtree_ties_go_to_earliest() {
        let entries = vec![
            Entry::internal(vec![4], 1),
            Entry::internal(vec![3], 2),
            Entry::internal(vec![3], 3),
        ];
        assert_eq!(choose_subtree(&FirstByte, &entries, b"x"), Some(1));
    }

    #[test]
    fn test_choose_subtree_on_leaf_page() {
        assert_eq!(choose_subtree(&FirstByte, &[Entry::leaf(vec![1])], b"x"), None);
        assert_eq!(choose_subtree(&FirstByte, &[], b"x"), None);
    }
}
