//! # DPoS State
//!
//! The authoritative, trie-backed world-state engine of the node.
//!
//! The [`StateFactory`] owns the mapping from account addresses to account
//! records, from contract addresses to code and storage, and from block
//! heights to delegate-candidate rosters. Per block it applies validated
//! actions (transfers, votes, executions) to cached in-memory views, then
//! batch-commits the mutations into two Merkle Patricia tries — the
//! account trie and the candidate trie — and persists their roots and the
//! new chain height.
//!
//! ## Core components
//!
//! - [`StateFactory`]: orchestration, lifecycle, and the public operations
//! - [`Account`]: the record stored in the account trie
//! - [`Contract`]: an account paired with its storage trie for the block
//! - [`Candidate`]: the delegate pool entry, archived per height
//! - [`codec`]: canonical binary encodings committed into the tries
//! - [`Transfer`] / [`Vote`] / [`Execution`]: validated actions
//!
//! The factory is single-writer: one block processor mutates it at a time,
//! and every operation blocks on the underlying store. Reads of committed
//! state ([`StateFactory::state`], [`StateFactory::balance`],
//! [`StateFactory::candidates_by_height`]) go straight to the tries.

pub mod account;
pub mod action;
pub mod address;
pub mod candidate;
pub mod codec;
pub mod config;
pub mod contract;
pub mod error;
pub mod factory;

pub use account::Account;
pub use action::{Execution, Transfer, Vote};
pub use address::AddrHash;
pub use candidate::Candidate;
pub use config::{Config, DEFAULT_NUM_CANDIDATES};
pub use contract::Contract;
pub use error::{StateError, StateResult};
pub use factory::{StateFactory, TrieOpts};
