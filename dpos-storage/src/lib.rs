//! # DPoS Storage
//!
//! Namespaced key-value storage for the DPoS node.
//!
//! This crate is the single home for byte-blob persistence. Everything the
//! node writes to disk goes through the [`KvStore`] trait, so higher layers
//! (the state tries, the state factory) never depend on a concrete backend.
//!
//! ## Core components
//!
//! - [`KvStore`]: namespaced get/put/delete plus atomic batch writes
//! - [`WriteBatch`]: ordered set of mutations applied in one backend write
//! - [`MemoryStore`]: in-process `HashMap` backend for tests and ephemeral chains
//! - [`RocksStore`]: RocksDB backend for persistent chains
//!
//! Namespaces are plain strings (`"Account"`, `"Candidate"`, `"Contract"`);
//! backends are free to map them to whatever physical layout they like, as
//! long as keys in different namespaces never collide.

mod batch;
mod error;
mod memory;
mod rocks;
mod traits;

pub use batch::{BatchOp, WriteBatch};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use rocks::RocksStore;
pub use traits::KvStore;
