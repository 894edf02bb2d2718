//! Validated actions consumed by the state factory.
//!
//! Wire format, signatures, and mempool admission happen upstream; by the
//! time an action reaches the factory it is assumed structurally valid.

use num_bigint::BigUint;

/// Token transfer between two accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Sender address; ignored for coinbase transfers.
    pub sender: String,
    /// Recipient address.
    pub recipient: String,
    /// Transferred amount.
    pub amount: BigUint,
    /// Sender nonce claimed by the transfer.
    pub nonce: u64,
    /// Block-reward transfer; mints without a sender debit.
    pub is_coinbase: bool,
    /// The transfer targets a contract and is settled by the VM instead.
    pub contract_call: bool,
}

impl Transfer {
    /// Plain transfer between two accounts.
    pub fn new(sender: &str, recipient: &str, amount: BigUint, nonce: u64) -> Self {
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            nonce,
            is_coinbase: false,
            contract_call: false,
        }
    }

    /// Block-reward transfer.
    pub fn coinbase(recipient: &str, amount: BigUint) -> Self {
        Self {
            sender: String::new(),
            recipient: recipient.to_string(),
            amount,
            nonce: 0,
            is_coinbase: true,
            contract_call: false,
        }
    }

    /// True when the transfer is settled through the contract store.
    pub fn is_contract_call(&self) -> bool {
        self.contract_call
    }
}

/// A vote, unvote, or self-nomination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    /// Voting account.
    pub voter: String,
    /// Endorsed address; empty revokes the vote, the voter's own address
    /// self-nominates.
    pub votee: String,
    /// Voter nonce claimed by the vote.
    pub nonce: u64,
    /// Voter's public key, recorded on self-nomination.
    pub voter_public_key: Vec<u8>,
}

impl Vote {
    /// Vote for `votee`.
    pub fn new(voter: &str, votee: &str, nonce: u64, voter_public_key: &[u8]) -> Self {
        Self {
            voter: voter.to_string(),
            votee: votee.to_string(),
            nonce,
            voter_public_key: voter_public_key.to_vec(),
        }
    }

    /// Revoke the voter's active vote.
    pub fn unvote(voter: &str, nonce: u64) -> Self {
        Self::new(voter, "", nonce, &[])
    }
}

/// Contract execution; the VM applies its effects through the contract
/// store, the factory only advances the executor's nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Executing account.
    pub executor: String,
    /// Target contract address.
    pub contract: String,
    /// Executor nonce claimed by the execution.
    pub nonce: u64,
    /// Call data handed to the VM.
    pub data: Vec<u8>,
}

impl Execution {
    /// Execution of `contract` by `executor`.
    pub fn new(executor: &str, contract: &str, nonce: u64, data: &[u8]) -> Self {
        Self {
            executor: executor.to_string(),
            contract: contract.to_string(),
            nonce,
            data: data.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    #[test]
    fn test_coinbase_has_no_sender() {
        let tx = Transfer::coinbase("recipient", BigUint::from(5u32));
        assert!(tx.is_coinbase);
        assert!(tx.sender.is_empty());
        assert!(!tx.is_contract_call());
    }

    #[test]
    fn test_unvote_has_empty_votee() {
        let vote = Vote::unvote("voter", 3);
        assert!(vote.votee.is_empty());
        assert!(vote.voter_public_key.is_empty());
    }

    #[test]
    fn test_transfer_defaults() {
        let tx = Transfer::new("a", "b", BigUint::zero(), 1);
        assert!(!tx.is_coinbase);
        assert!(!tx.contract_call);
    }
}
