//! The pluggable policy that gives a tree its semantics.
//!
//! The engine never interprets entry values. Matching, summarizing,
//! placement cost and page splitting all come from a [`Policy`] supplied
//! once per tree.

use crate::codec::{encoded_len, Entry};

/// Capability set consumed by [`crate::Tree`].
///
/// Implementations should be stateless: every call receives what it needs.
/// Values handed to `consistent` and `penalty` are either leaf values (user
/// data) or summaries previously produced by `union`, so a policy must be
/// able to tell the two apart or encode them uniformly.
pub trait Policy: Send + Sync {
    /// Opaque predicate type for searches and deletes.
    type Query: ?Sized + Sync;

    /// Does `value` (leaf value or subtree summary) match `query`?
    fn consistent(&self, value: &[u8], query: &Self::Query) -> bool;

    /// Summary of `entries`, stored as the parent entry's value.
    fn union(&self, entries: &[Entry]) -> Vec<u8>;

    /// Cost of placing `item` under a subtree summarized by `summary`.
    /// Lower is preferred; ties go to the earliest entry.
    fn penalty(&self, summary: &[u8], item: &[u8]) -> f64;

    /// Cuts a page worth of entries off the front of `entries`.
    ///
    /// If the encoded page fits `max_size`, return `(entries, vec![])`.
    /// Otherwise return a non-empty head that fits (an even two-way split
    /// when both halves fit, else the largest fitting prefix) and the
    /// remainder, which the caller splits again. The head holds at least
    /// one entry even when that entry alone exceeds `max_size`.
    ///
    /// [`split_sorted`] implements this for already sorted input.
    fn first_split(&self, entries: Vec<Entry>, max_size: usize) -> (Vec<Entry>, Vec<Entry>);

    /// Orders a page's entries in place before it is written.
    fn sort(&self, entries: &mut [Entry]);
}

/// Reference `first_split` for policies whose `sort` has already run.
pub fn split_sorted(mut entries: Vec<Entry>, max_size: usize) -> (Vec<Entry>, Vec<Entry>) {
    let total = encoded_len(&entries);
    if total <= max_size {
        return (entries, Vec::new());
    }
    let half = total / 2;

    let mut size = encoded_len(&[]);
    for (i, entry) in entries.iter().enumerate() {
        if size > half {
            return split_at(entries, i);
        }
        size += entry.encoded_len();
        if size > max_size {
            return split_at(entries, i);
        }
    }
    (entries, Vec::new())
}

fn split_at(mut entries: Vec<Entry>, at: usize) -> (Vec<Entry>, Vec<Entry>) {
    // Never hand back an empty head.
    let rest = entries.split_off(at.max(1));
    if at == 0 {
        log::warn!(
            "single entry of {} bytes exceeds the split threshold",
            entries[0].encoded_len()
        );
    }
    (entries, rest)
}

/// Sorts entries by a key decoded from their values.
///
/// Each value is decoded once; the keys live in a side table for the
/// duration of the sort and are dropped afterwards.
pub fn sort_by_decoded_key<K, F>(entries: &mut [Entry], mut decode: F)
where
    K: Ord,
    F: FnMut(&[u8]) -> K,
{
    entries.sort_by_cached_key(|entry| decode(&entry.value));
}
