//! State factory configuration.

use serde::{Deserialize, Serialize};

/// Default cap on the returned candidate list.
pub const DEFAULT_NUM_CANDIDATES: usize = 36;

/// Configuration of a [`crate::StateFactory`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem path of the trie-backing store. Must be non-empty when
    /// the factory is built with the on-disk trie option.
    #[serde(default)]
    pub trie_db_path: String,

    /// Maximum size of returned candidate lists.
    #[serde(default = "default_num_candidates")]
    pub num_candidates: usize,
}

fn default_num_candidates() -> usize {
    DEFAULT_NUM_CANDIDATES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trie_db_path: String::new(),
            num_candidates: DEFAULT_NUM_CANDIDATES,
        }
    }
}

impl Config {
    /// Configuration with an on-disk store at `path`.
    pub fn with_path<P: Into<String>>(path: P) -> Self {
        Self {
            trie_db_path: path.into(),
            ..Self::default()
        }
    }
}
