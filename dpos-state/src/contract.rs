//! Contract handle: an account record paired with its storage trie.

use dpos_mpt::{Hash256, Trie, ZERO_HASH};
use tracing::debug;

use crate::account::Account;
use crate::address::hash256;
use crate::error::{StateError, StateResult};

/// Reserved storage-trie key holding the contract code:
/// `sha256("contract.code")`. Keeping the code inside the storage trie
/// makes every contract's storage root non-empty and commits the code
/// under the same root as its state.
pub const CODE_KEY: Hash256 = [
    0x7b, 0x93, 0x08, 0x0e, 0x62, 0x4f, 0xc0, 0xec, 0x2d, 0xf4, 0x5f, 0x3b, 0x25, 0x4c, 0xc2,
    0x45, 0xf7, 0x6f, 0xc9, 0x8a, 0xea, 0x6c, 0xa5, 0xae, 0x9c, 0xca, 0x04, 0x7d, 0xac, 0xbd,
    0xfe, 0x3b,
];

/// A contract being read or mutated within the current block.
///
/// The handle exclusively owns the contract's storage trie until the
/// factory commits and drops it.
pub struct Contract {
    account: Account,
    storage: Trie,
}

impl Contract {
    pub(crate) fn new(account: Account, storage: Trie) -> Self {
        Self { account, storage }
    }

    /// The contract's own account record.
    pub fn self_state(&self) -> &Account {
        &self.account
    }

    /// Reads a 32-byte storage slot; [`ZERO_HASH`] when the slot is unset.
    pub fn get_state(&mut self, key: &Hash256) -> StateResult<Hash256> {
        match self.storage.get(key)? {
            Some(bytes) => Hash256::try_from(bytes.as_slice())
                .map_err(|_| StateError::Decoding("storage value is not 32 bytes".to_string())),
            None => Ok(ZERO_HASH),
        }
    }

    /// Writes a 32-byte storage slot.
    pub fn set_state(&mut self, key: &Hash256, value: &Hash256) -> StateResult<()> {
        self.storage.upsert(key, value)?;
        Ok(())
    }

    /// Stores `code` under [`CODE_KEY`] and records its hash.
    pub fn set_code(&mut self, code: &[u8]) -> StateResult<()> {
        self.account.code_hash = hash256(code);
        self.storage.upsert(&CODE_KEY, code)?;
        debug!(
            target: "dpos::state",
            code_hash = %hex::encode(self.account.code_hash),
            code_len = code.len(),
            "contract code set"
        );
        Ok(())
    }

    /// The stored code, or `None` when the trie holds none.
    pub fn code(&mut self) -> StateResult<Option<Vec<u8>>> {
        Ok(self.storage.get(&CODE_KEY)?)
    }

    /// Flushes the storage trie and folds the new root into the record.
    pub(crate) fn commit(&mut self) -> StateResult<()> {
        self.account.root = self.storage.commit()?;
        Ok(())
    }
}
