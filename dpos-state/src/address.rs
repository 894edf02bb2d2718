//! Address strings and the hashes behind them.
//!
//! An address is the lowercase hex encoding of the 20-byte hash of the
//! account's public key, so the string form and the trie key are in
//! bijection: [`pubkey_hash`] and [`to_address`] are exact inverses.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use dpos_mpt::Hash256;

use crate::error::{StateError, StateResult};

/// 20-byte public-key hash; the account-trie key.
pub type AddrHash = [u8; 20];

/// Decodes an address string into its 20-byte public-key hash.
pub fn pubkey_hash(address: &str) -> StateResult<AddrHash> {
    let bytes = hex::decode(address)
        .map_err(|e| StateError::Decoding(format!("invalid address {address}: {e}")))?;
    AddrHash::try_from(bytes.as_slice()).map_err(|_| {
        StateError::Decoding(format!(
            "invalid address {address}: expected 20 bytes, got {}",
            bytes.len()
        ))
    })
}

/// Encodes a 20-byte public-key hash as an address string.
pub fn to_address(hash: &AddrHash) -> String {
    hex::encode(hash)
}

/// Derives the address of a public key: hash160 (sha256 then ripemd160).
pub fn from_public_key(public_key: &[u8]) -> String {
    let sha = Sha256::digest(public_key);
    let mut hash = AddrHash::default();
    hash.copy_from_slice(&Ripemd160::digest(sha));
    to_address(&hash)
}

/// sha256 digest as a fixed 32-byte array.
pub fn hash256(bytes: &[u8]) -> Hash256 {
    let mut hash = Hash256::default();
    hash.copy_from_slice(&Sha256::digest(bytes));
    hash
}
