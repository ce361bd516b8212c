// gist/src/codec/mod.rs
//
// Binary layouts, all integers little-endian:
//
//   entry: [u32 value length][value bytes][u64 child page id, 0 = leaf]
//   page:  [u32 entry count][entries...]
//   root:  [u64 root page id, 0 = empty][u32 depth][4 reserved zero bytes]

use crate::error::{GistError, GistResult};
use bytes::{Buf, BufMut};
use storage::{PageId, HEAD_SIZE};

/// Bytes an entry occupies besides its value.
pub const ENTRY_OVERHEAD: usize = 12;

/// Bytes of the entry count that prefixes every page.
pub const PAGE_HEADER_SIZE: usize = 4;

/// Serialized size of a [`Root`].
pub const ROOT_SIZE: usize = HEAD_SIZE;

/// One slot of a page: user data in a leaf, a subtree summary otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    pub value: Vec<u8>,
    pub child: Option<PageId>,
}

impl Entry {
    pub fn leaf(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            child: None,
        }
    }

    pub fn internal(value: impl Into<Vec<u8>>, child: PageId) -> Self {
        Self {
            value: value.into(),
            child: Some(child),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.child.is_none()
    }

    pub fn encoded_len(&self) -> usize {
        ENTRY_OVERHEAD + self.value.len()
    }

    /// Writes the entry to the front of `buf`, returning the bytes used.
    pub fn encode(&self, buf: &mut [u8]) -> GistResult<usize> {
        let needed = self.encoded_len();
        if buf.len() < needed {
            return Err(GistError::TooShort {
                needed,
                available: buf.len(),
            });
        }

        let mut out = &mut buf[..needed];
        out.put_u32_le(self.value.len() as u32);
        out.put_slice(&self.value);
        out.put_u64_le(self.child.unwrap_or(0));
        Ok(needed)
    }

    /// Reads one entry from the front of `buf`, returning it and the bytes
    /// consumed.
    pub fn decode(buf: &[u8]) -> GistResult<(Self, usize)> {
        let mut cur = buf;
        if cur.remaining() < 4 {
            return Err(GistError::TooShort {
                needed: 4,
                available: buf.len(),
            });
        }

        let len = cur.get_u32_le() as usize;
        let needed = ENTRY_OVERHEAD + len;
        if buf.len() < needed {
            return Err(GistError::TooShort {
                needed,
                available: buf.len(),
            });
        }

        let value = cur[..len].to_vec();
        cur.advance(len);
        let child = match cur.get_u64_le() {
            0 => None,
            id => Some(id),
        };
        Ok((Self { value, child }, needed))
    }
}

/// Serialized size of a page holding `entries`.
pub fn encoded_len(entries: &[Entry]) -> usize {
    PAGE_HEADER_SIZE + entries.iter().map(Entry::encoded_len).sum::<usize>()
}

/// Writes a page to the front of `buf`, returning the bytes used. `buf` is
/// normally sized to the backend's page capacity.
pub fn encode_page(entries: &[Entry], buf: &mut [u8]) -> GistResult<usize> {
    let needed = encoded_len(entries);
    if buf.len() < needed {
        return Err(GistError::TooShort {
            needed,
            available: buf.len(),
        });
    }

    (&mut buf[..PAGE_HEADER_SIZE]).put_u32_le(entries.len() as u32);
    let mut pos = PAGE_HEADER_SIZE;
    for entry in entries {
        pos += entry.encode(&mut buf[pos..])?;
    }
    Ok(pos)
}

/// Reads a page. Trailing bytes after the last entry are ignored.
pub fn decode_page(buf: &[u8]) -> GistResult<Vec<Entry>> {
    let mut cur = buf;
    if cur.remaining() < PAGE_HEADER_SIZE {
        return Err(GistError::TooShort {
            needed: PAGE_HEADER_SIZE,
            available: buf.len(),
        });
    }

    let count = cur.get_u32_le() as usize;
    // Reject absurd counts before allocating for them.
    let minimum = count.saturating_mul(ENTRY_OVERHEAD);
    if cur.remaining() < minimum {
        return Err(GistError::TooShort {
            needed: PAGE_HEADER_SIZE.saturating_add(minimum),
            available: buf.len(),
        });
    }

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let (entry, used) = Entry::decode(cur)?;
        cur.advance(used);
        entries.push(entry);
    }
    Ok(entries)
}

/// How the entries of one page relate to the tree levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Empty,
    Leaf,
    Internal,
    Mixed,
}

pub fn page_kind(entries: &[Entry]) -> PageKind {
    let leaves = entries.iter().filter(|e| e.is_leaf()).count();
    match (leaves, entries.len()) {
        (_, 0) => PageKind::Empty,
        (l, n) if l == n => PageKind::Leaf,
        (0, _) => PageKind::Internal,
        _ => PageKind::Mixed,
    }
}

/// Per-object descriptor stored in a head record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Root {
    /// `None` for an empty tree.
    pub root_page: Option<PageId>,
    /// Levels from root to leaf inclusive; 1 means the root is a leaf.
    pub depth: u32,
}

impl Root {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root_page.is_none()
    }

    pub fn encode(&self, buf: &mut [u8]) -> GistResult<()> {
        if buf.len() < ROOT_SIZE {
            return Err(GistError::TooShort {
                needed: ROOT_SIZE,
                available: buf.len(),
            });
        }

        let mut out = &mut buf[..ROOT_SIZE];
        out.put_u64_le(self.root_page.unwrap_or(0));
        out.put_u32_le(self.depth);
        out.put_bytes(0, 4); // reserved
        Ok(())
    }

    pub fn decode(buf: &[u8]) -> GistResult<Self> {
        if buf.len() < ROOT_SIZE {
            return Err(GistError::TooShort {
                needed: ROOT_SIZE,
                available: buf.len(),
            });
        }

        let mut cur = buf;
        let root_page = match cur.get_u64_le() {
            0 => None,
            id => Some(id),
        };
        let depth = cur.get_u32_le();
        Ok(Self { root_page, depth })
    }
}
