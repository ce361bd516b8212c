#![allow(dead_code)]

//! Shared fixtures: a one-dimensional range policy over 6-byte keys.
//!
//! Leaf values are 48-bit big-endian keys. Summaries are 12 bytes, the
//! lowest key followed by the highest.

use gist::policy::sort_by_decoded_key;
use gist::{split_sorted, Entry, Policy, Tree};
use std::sync::Arc;
use storage::MemoryBackend;

pub const KEY_LEN: usize = 6;
pub const SUMMARY_LEN: usize = 2 * KEY_LEN;

/// Inclusive key interval.
#[derive(Debug, Clone, Copy)]
pub struct KeyRange {
    pub lo: u64,
    pub hi: u64,
}

impl KeyRange {
    pub fn new(lo: u64, hi: u64) -> Self {
        Self { lo, hi }
    }

    pub fn point(k: u64) -> Self {
        Self::new(k, k)
    }

    pub fn all() -> Self {
        Self::new(0, u64::MAX)
    }
}

pub fn key(k: u64) -> Vec<u8> {
    k.to_be_bytes()[8 - KEY_LEN..].to_vec()
}

pub fn decode_key(buf: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes[8 - KEY_LEN..].copy_from_slice(&buf[..KEY_LEN]);
    u64::from_be_bytes(bytes)
}

/// Bounds of a leaf value or a summary.
pub fn bounds(value: &[u8]) -> (u64, u64) {
    match value.len() {
        SUMMARY_LEN => (decode_key(&value[..KEY_LEN]), decode_key(&value[KEY_LEN..])),
        _ => {
            let k = decode_key(value);
            (k, k)
        }
    }
}

pub struct RangePolicy;

impl Policy for RangePolicy {
    type Query = KeyRange;

    fn consistent(&self, value: &[u8], query: &KeyRange) -> bool {
        let (lo, hi) = bounds(value);
        lo <= query.hi && query.lo <= hi
    }

    fn union(&self, entries: &[Entry]) -> Vec<u8> {
        let (lo, hi) = entries
            .iter()
            .map(|e| bounds(&e.value))
            .fold((u64::MAX, 0), |(lo, hi), (l, h)| (lo.min(l), hi.max(h)));
        let mut summary = key(lo);
        summary.extend_from_slice(&key(hi));
        summary
    }

    fn penalty(&self, summary: &[u8], item: &[u8]) -> f64 {
        let (lo, hi) = bounds(summary);
        let k = decode_key(item);
        if k < lo {
            (lo - k) as f64
        } else if k > hi {
            (k - hi) as f64
        } else {
            0.0
        }
    }

    fn first_split(&self, entries: Vec<Entry>, max_size: usize) -> (Vec<Entry>, Vec<Entry>) {
        split_sorted(entries, max_size)
    }

    fn sort(&self, entries: &mut [Entry]) {
        sort_by_decoded_key(entries, bounds);
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub type MemoryTree = Tree<Arc<MemoryBackend>, RangePolicy>;

pub fn memory_tree(page_size: usize) -> MemoryTree {
    init_logging();
    Tree::new(Arc::new(MemoryBackend::new(page_size)), RangePolicy)
}

/// Keys of a search result, in stream order.
pub fn keys(values: &[Vec<u8>]) -> Vec<u64> {
    values.iter().map(|v| decode_key(v)).collect()
}
