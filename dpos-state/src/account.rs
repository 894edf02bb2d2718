//! Account record: the value stored in the account trie.

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use dpos_mpt::{Hash256, EMPTY_ROOT, ZERO_HASH};

use crate::error::{StateError, StateResult};

/// The state of one account, keyed by its 20-byte public-key hash.
///
/// Plain accounts carry [`EMPTY_ROOT`] as their storage root and
/// [`ZERO_HASH`] as their code hash; a contract's storage root commits to
/// its storage trie (which also holds its code), so it is never the empty
/// root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Token balance.
    pub balance: BigUint,

    /// Nonce of the latest outgoing action; starts at 1 on the first one.
    pub nonce: u64,

    /// Sum of the balances of accounts endorsing this one.
    pub voting_weight: BigInt,

    /// Address this account votes for; empty means no active vote.
    pub votee: String,

    /// True iff this account self-nominated and has not unvoted.
    pub is_candidate: bool,

    /// Storage-trie root; [`EMPTY_ROOT`] for non-contract accounts.
    pub root: Hash256,

    /// Hash of the contract code; [`ZERO_HASH`] for non-contract accounts.
    pub code_hash: Hash256,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            balance: BigUint::zero(),
            nonce: 0,
            voting_weight: BigInt::zero(),
            votee: String::new(),
            is_candidate: false,
            root: EMPTY_ROOT,
            code_hash: ZERO_HASH,
        }
    }
}

impl Account {
    /// Creates a fresh record with an initial balance.
    pub fn with_balance(balance: BigUint) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }

    /// Adds `amount` to the balance.
    pub fn add_balance(&mut self, amount: &BigUint) {
        self.balance += amount;
    }

    /// Subtracts `amount` from the balance.
    ///
    /// Fails with [`StateError::InsufficientBalance`] when the balance
    /// does not cover `amount`; the balance is left untouched in that case.
    pub fn sub_balance(&mut self, amount: &BigUint) -> StateResult<()> {
        if *amount > self.balance {
            return Err(StateError::InsufficientBalance);
        }
        self.balance -= amount;
        Ok(())
    }

    /// True iff this account owns a storage trie.
    pub fn is_contract(&self) -> bool {
        self.root != EMPTY_ROOT && self.root != ZERO_HASH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_account() {
        let account = Account::default();
        assert!(account.balance.is_zero());
        assert_eq!(account.nonce, 0);
        assert!(account.voting_weight.is_zero());
        assert!(account.votee.is_empty());
        assert!(!account.is_candidate);
        assert!(!account.is_contract());
    }

    #[test]
    fn test_balance_arithmetic() {
        let mut account = Account::with_balance(BigUint::from(100u32));
        account.add_balance(&BigUint::from(50u32));
        assert_eq!(account.balance, BigUint::from(150u32));

        account.sub_balance(&BigUint::from(150u32)).unwrap();
        assert!(account.balance.is_zero());
    }

    #[test]
    fn test_sub_balance_overdraw() {
        let mut account = Account::with_balance(BigUint::from(10u32));
        let err = account.sub_balance(&BigUint::from(11u32)).unwrap_err();
        assert!(matches!(err, StateError::InsufficientBalance));
        // balance untouched after the failed debit
        assert_eq!(account.balance, BigUint::from(10u32));
    }

    #[test]
    fn test_is_contract() {
        let mut account = Account::default();
        assert!(!account.is_contract());
        account.root = [0x42; 32];
        assert!(account.is_contract());
        account.root = ZERO_HASH;
        assert!(!account.is_contract());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut account = Account::with_balance(BigUint::from(7u32));
        account.voting_weight = BigInt::from(-3);
        account.votee = "aa".repeat(20);

        let json = serde_json::to_string(&account).unwrap();
        let decoded: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(account, decoded);
    }
}
