//! Generalized search tree over paginated storage
//!
//! This crate provides a disk-paginated GiST: a search tree whose key
//! semantics come from a pluggable [`Policy`] rather than a fixed
//! comparison. A new kind of index is a new policy.
//!
//! Pages live in a [`storage::Backend`] addressed by opaque 64-bit ids.
//! Each indexed object owns one head record holding its [`Root`].
//!
//! ```rust,ignore
//! use gist::{CancelToken, Tree};
//! use storage::MemoryBackend;
//!
//! let tree = Tree::new(MemoryBackend::new(4096), MyPolicy);
//! let object = tree.create_object()?;
//! tree.insert(object, b"value")?;
//!
//! let token = CancelToken::new();
//! let hits = tree.search_to_vec(object, &my_query, &token)?;
//! ```

pub mod cancel;
pub mod codec;
pub mod config;
pub mod error;
pub mod policy;
pub mod pool;
pub mod tree;

pub use cancel::CancelToken;
pub use codec::{Entry, Root};
pub use config::TreeConfig;
pub use error::{GistError, GistResult};
pub use policy::{split_sorted, Policy};
pub use tree::{DeleteOutcome, Tree, TreeStats};
