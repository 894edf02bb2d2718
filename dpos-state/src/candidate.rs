//! Delegate candidates and their deterministic ordering.

use std::cmp::Ordering;
use std::collections::HashMap;

use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

/// A self-nominated account eligible for delegate selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Account address.
    pub address: String,
    /// Public key supplied with the self-nomination.
    pub public_key: Vec<u8>,
    /// Aggregated voting weight.
    pub votes: BigInt,
    /// Height of the block that self-nominated this account.
    pub creation_height: u64,
    /// Height of the last weight update.
    pub last_update_height: u64,
}

impl Candidate {
    /// Creates a candidate at its self-nomination height.
    pub fn new(address: String, public_key: Vec<u8>, creation_height: u64) -> Self {
        Self {
            address,
            public_key,
            votes: BigInt::zero(),
            creation_height,
            last_update_height: creation_height,
        }
    }
}

// Total order over candidates: most votes first, then earliest
// nomination, then lexicographic address.
fn compare(a: &Candidate, b: &Candidate) -> Ordering {
    b.votes
        .cmp(&a.votes)
        .then_with(|| a.creation_height.cmp(&b.creation_height))
        .then_with(|| a.address.cmp(&b.address))
}

/// Sorts candidates by the canonical total order.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(compare);
}

/// Indexes a candidate list by address.
pub fn candidates_to_map(candidates: Vec<Candidate>) -> HashMap<String, Candidate> {
    candidates
        .into_iter()
        .map(|candidate| (candidate.address.clone(), candidate))
        .collect()
}

/// Flattens the live pool back into a list; order is unspecified, callers
/// sort before use.
pub fn map_to_candidates(pool: &HashMap<String, Candidate>) -> Vec<Candidate> {
    pool.values().cloned().collect()
}
