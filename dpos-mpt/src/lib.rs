//! # DPoS MPT
//!
//! Merkle Patricia trie over a namespaced key-value store.
//!
//! The trie maps byte keys to byte values and commits its nodes into a
//! [`dpos_storage::KvStore`] namespace, content-addressed by node hash.
//! The root hash is a cryptographic commitment to the full key/value set:
//! two tries holding the same entries have the same root, regardless of
//! insertion order.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use dpos_mpt::{Trie, EMPTY_ROOT};
//! use dpos_storage::MemoryStore;
//!
//! let db = Arc::new(MemoryStore::new());
//! let mut trie = Trie::new(db.clone(), "Account", EMPTY_ROOT).unwrap();
//! trie.upsert(b"key00000", b"value").unwrap();
//! let root = trie.commit().unwrap();
//!
//! // reopen at the committed root
//! let mut reopened = Trie::new(db, "Account", root).unwrap();
//! assert_eq!(reopened.get(b"key00000").unwrap(), Some(b"value".to_vec()));
//! ```
//!
//! Keys within one trie are expected to share a common length (address
//! hashes, block heights); a key that is a strict prefix of another key is
//! rejected as corrupt.

mod error;
mod helper;
mod node;
mod trie;

pub use error::{MptError, MptResult};
pub use helper::{common_prefix_length, from_nibbles, to_nibbles};
pub use node::{Hash256, EMPTY_ROOT, ZERO_HASH};
pub use trie::Trie;
