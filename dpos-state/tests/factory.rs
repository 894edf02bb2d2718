//! End-to-end scenarios driving the state factory through whole blocks.

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use tempfile::TempDir;

use dpos_mpt::{Trie, EMPTY_ROOT};
use dpos_state::{
    Config, Execution, StateError, StateFactory, Transfer, TrieOpts, Vote,
};
use dpos_storage::MemoryStore;
use std::sync::Arc;

fn addr(seed: u8) -> String {
    hex::encode([seed; 20])
}

fn amount(value: u64) -> BigUint {
    BigUint::from(value)
}

fn factory() -> StateFactory {
    let mut factory = StateFactory::new(&Config::default(), TrieOpts::InMemory).unwrap();
    factory.start().unwrap();
    factory
}

#[test]
fn test_single_transfer() {
    let (a, b) = (addr(1), addr(2));
    let mut sf = factory();

    sf.create_account(&a, amount(100)).unwrap();
    sf.create_account(&b, amount(0)).unwrap();
    sf.commit_state_changes(0, &[], &[], &[]).unwrap();

    let transfer = Transfer::new(&a, &b, amount(30), 1);
    sf.commit_state_changes(1, &[transfer], &[], &[]).unwrap();

    assert_eq!(sf.balance(&a).unwrap(), amount(70));
    assert_eq!(sf.nonce(&a).unwrap(), 1);
    assert_eq!(sf.balance(&b).unwrap(), amount(30));
    assert_eq!(sf.height().unwrap(), 1);
}

#[test]
fn test_overdraw_aborts_commit() {
    let (a, b) = (addr(1), addr(2));
    let mut sf = factory();

    sf.create_account(&a, amount(10)).unwrap();
    sf.commit_state_changes(0, &[], &[], &[]).unwrap();
    let root_before = sf.root_hash();

    let transfer = Transfer::new(&a, &b, amount(20), 1);
    let err = sf
        .commit_state_changes(1, &[transfer], &[], &[])
        .unwrap_err();
    assert!(matches!(err, StateError::InsufficientBalance));

    // persisted state is untouched
    assert_eq!(sf.balance(&a).unwrap(), amount(10));
    assert!(matches!(sf.state(&b), Err(StateError::AccountNotFound(_))));
    assert_eq!(sf.height().unwrap(), 0);
    assert_eq!(sf.root_hash(), root_before);
}

#[test]
fn test_self_vote_creates_candidate() {
    let c = addr(3);
    let mut sf = factory();

    sf.create_account(&c, amount(50)).unwrap();
    sf.commit_state_changes(0, &[], &[], &[]).unwrap();
    for height in 1..5 {
        sf.commit_state_changes(height, &[], &[], &[]).unwrap();
    }

    let vote = Vote::new(&c, &c, 1, b"pubkey-c");
    sf.commit_state_changes(5, &[], &[vote], &[]).unwrap();

    let state = sf.state(&c).unwrap();
    assert!(state.is_candidate);
    assert_eq!(state.votee, c);

    let (height, pool) = sf.candidates();
    assert_eq!(height, 5);
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].address, c);
    assert_eq!(pool[0].votes, BigInt::from(50));
    assert_eq!(pool[0].creation_height, 5);
    assert_eq!(pool[0].public_key, b"pubkey-c".to_vec());

    let archived = sf.candidates_by_height(5).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].address, c);
    assert_eq!(archived[0].votes, BigInt::from(50));
}

#[test]
fn test_revote_moves_weight() {
    let (c, d) = (addr(3), addr(4));
    let mut sf = factory();

    sf.create_account(&c, amount(50)).unwrap();
    sf.commit_state_changes(0, &[], &[Vote::new(&c, &c, 1, b"pk-c")], &[])
        .unwrap();

    sf.commit_state_changes(1, &[], &[Vote::new(&c, &d, 2, b"pk-c")], &[])
        .unwrap();

    let c_state = sf.state(&c).unwrap();
    let d_state = sf.state(&d).unwrap();
    assert_eq!(c_state.votee, d);
    assert_eq!(d_state.voting_weight, BigInt::from(50));
    // the candidate flag only clears on an explicit unvote
    assert!(c_state.is_candidate);

    // the self-endorsement is gone, so the candidate entry drops to the
    // weight contributed by others
    let (_, pool) = sf.candidates();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].votes, BigInt::zero());
}

#[test]
fn test_unvote_removes_candidate() {
    let c = addr(3);
    let mut sf = factory();

    sf.create_account(&c, amount(50)).unwrap();
    sf.commit_state_changes(0, &[], &[Vote::new(&c, &c, 1, b"pk-c")], &[])
        .unwrap();
    assert_eq!(sf.candidates().1.len(), 1);

    sf.commit_state_changes(1, &[], &[Vote::unvote(&c, 2)], &[])
        .unwrap();

    let state = sf.state(&c).unwrap();
    assert!(!state.is_candidate);
    // an unvote clears the candidate flag but leaves the self-votee string
    assert_eq!(state.votee, c);
    assert!(sf.candidates().1.is_empty());
    assert!(sf.candidates_by_height(1).unwrap().is_empty());
}

#[test]
fn test_transfer_updates_endorsee_weight() {
    let (a, b, e) = (addr(1), addr(2), addr(5));
    let mut sf = factory();

    sf.create_account(&a, amount(100)).unwrap();
    sf.commit_state_changes(0, &[], &[Vote::new(&a, &e, 1, b"pk-a")], &[])
        .unwrap();
    assert_eq!(sf.state(&e).unwrap().voting_weight, BigInt::from(100));

    let transfer = Transfer::new(&a, &b, amount(40), 2);
    sf.commit_state_changes(1, &[transfer], &[], &[]).unwrap();

    assert_eq!(sf.balance(&a).unwrap(), amount(60));
    assert_eq!(sf.balance(&b).unwrap(), amount(40));
    assert_eq!(sf.state(&e).unwrap().voting_weight, BigInt::from(60));
}

#[test]
fn test_self_transfer_only_advances_nonce() {
    let a = addr(1);
    let mut sf = factory();

    sf.create_account(&a, amount(100)).unwrap();
    sf.commit_state_changes(0, &[], &[], &[]).unwrap();

    let transfer = Transfer::new(&a, &a, amount(25), 4);
    sf.commit_state_changes(1, &[transfer], &[], &[]).unwrap();

    assert_eq!(sf.balance(&a).unwrap(), amount(100));
    assert_eq!(sf.nonce(&a).unwrap(), 4);
}

#[test]
fn test_coinbase_mints_without_sender() {
    let miner = addr(7);
    let mut sf = factory();

    sf.commit_state_changes(0, &[Transfer::coinbase(&miner, amount(16))], &[], &[])
        .unwrap();
    assert_eq!(sf.balance(&miner).unwrap(), amount(16));
}

#[test]
fn test_recipient_endorsee_gains_weight() {
    let (a, b, e) = (addr(1), addr(2), addr(5));
    let mut sf = factory();

    sf.create_account(&a, amount(100)).unwrap();
    sf.create_account(&b, amount(10)).unwrap();
    sf.commit_state_changes(0, &[], &[Vote::new(&b, &e, 1, b"pk-b")], &[])
        .unwrap();
    assert_eq!(sf.state(&e).unwrap().voting_weight, BigInt::from(10));

    sf.commit_state_changes(1, &[Transfer::new(&a, &b, amount(30), 1)], &[], &[])
        .unwrap();
    assert_eq!(sf.state(&e).unwrap().voting_weight, BigInt::from(40));
}

#[test]
fn test_revote_to_same_votee_is_weight_neutral() {
    let (a, e) = (addr(1), addr(5));
    let mut sf = factory();

    sf.create_account(&a, amount(100)).unwrap();
    sf.commit_state_changes(0, &[], &[Vote::new(&a, &e, 1, b"pk-a")], &[])
        .unwrap();

    sf.commit_state_changes(1, &[], &[Vote::new(&a, &e, 2, b"pk-a")], &[])
        .unwrap();

    assert_eq!(sf.state(&e).unwrap().voting_weight, BigInt::from(100));
    assert_eq!(sf.state(&a).unwrap().votee, e);
}

#[test]
fn test_execution_double_advances_nonce() {
    let (a, contract) = (addr(1), addr(8));
    let mut sf = factory();

    sf.create_account(&a, amount(10)).unwrap();
    sf.commit_state_changes(0, &[], &[], &[]).unwrap();

    // nonce below the increment: plain +1
    let exec = Execution::new(&a, &contract, 0, &[]);
    sf.commit_state_changes(1, &[], &[], &[exec]).unwrap();
    assert_eq!(sf.nonce(&a).unwrap(), 1);

    // claimed nonce above the increment wins
    let exec = Execution::new(&a, &contract, 9, &[]);
    sf.commit_state_changes(2, &[], &[], &[exec]).unwrap();
    assert_eq!(sf.nonce(&a).unwrap(), 9);
}

#[test]
fn test_nonce_never_decreases() {
    let (a, b) = (addr(1), addr(2));
    let mut sf = factory();

    sf.create_account(&a, amount(100)).unwrap();
    sf.commit_state_changes(0, &[Transfer::new(&a, &b, amount(1), 5)], &[], &[])
        .unwrap();
    assert_eq!(sf.nonce(&a).unwrap(), 5);

    // a stale transfer nonce does not move it back
    sf.commit_state_changes(1, &[Transfer::new(&a, &b, amount(1), 2)], &[], &[])
        .unwrap();
    assert_eq!(sf.nonce(&a).unwrap(), 5);
}

#[test]
fn test_voting_weight_is_conserved() {
    let (a, b, c) = (addr(1), addr(2), addr(3));
    let mut sf = factory();

    sf.create_account(&a, amount(100)).unwrap();
    sf.create_account(&b, amount(40)).unwrap();
    sf.create_account(&c, amount(60)).unwrap();
    let votes = vec![
        Vote::new(&c, &c, 1, b"pk-c"),
        Vote::new(&a, &c, 1, b"pk-a"),
        Vote::new(&b, &c, 1, b"pk-b"),
    ];
    sf.commit_state_changes(0, &[], &votes, &[]).unwrap();

    // every voter contributes its balance exactly once
    let (_, pool) = sf.candidates();
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].votes, BigInt::from(200));

    // moving balance between voters keeps the total
    sf.commit_state_changes(1, &[Transfer::new(&a, &b, amount(30), 2)], &[], &[])
        .unwrap();
    let (_, pool) = sf.candidates();
    assert_eq!(pool[0].votes, BigInt::from(200));
}

#[test]
fn test_roots_are_deterministic_across_factories() {
    let run = || {
        let (a, b, c) = (addr(1), addr(2), addr(3));
        let mut sf = factory();
        sf.create_account(&a, amount(1000)).unwrap();
        sf.create_account(&b, amount(500)).unwrap();
        sf.commit_state_changes(0, &[], &[], &[]).unwrap();

        sf.commit_state_changes(
            1,
            &[
                Transfer::new(&a, &b, amount(123), 1),
                Transfer::coinbase(&c, amount(16)),
            ],
            &[Vote::new(&b, &b, 1, b"pk-b")],
            &[],
        )
        .unwrap();

        sf.commit_state_changes(
            2,
            &[Transfer::new(&b, &c, amount(77), 2)],
            &[Vote::new(&a, &b, 2, b"pk-a")],
            &[],
        )
        .unwrap();
        sf
    };

    let one = run();
    let two = run();
    assert_eq!(one.root_hash(), two.root_hash());
    assert_eq!(
        one.candidates_by_height(2).unwrap(),
        two.candidates_by_height(2).unwrap()
    );
}

#[test]
fn test_truncates_to_configured_candidate_cap() {
    let cfg = Config {
        trie_db_path: String::new(),
        num_candidates: 2,
    };
    let mut sf = StateFactory::new(&cfg, TrieOpts::InMemory).unwrap();
    sf.start().unwrap();

    let mut votes = Vec::new();
    for seed in 1..=4u8 {
        let voter = addr(seed);
        sf.create_account(&voter, amount(u64::from(seed) * 10))
            .unwrap();
        votes.push(Vote::new(&voter, &voter, 1, b"pk"));
    }
    sf.commit_state_changes(0, &[], &votes, &[]).unwrap();

    let (_, pool) = sf.candidates();
    assert_eq!(pool.len(), 2);
    // the two heaviest self-voters survive the cut
    assert_eq!(pool[0].address, addr(4));
    assert_eq!(pool[1].address, addr(3));

    assert_eq!(sf.candidates_by_height(0).unwrap().len(), 2);
}

#[test]
fn test_precreated_trie_option() {
    let db: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let trie = Trie::new(db, "Account", EMPTY_ROOT).unwrap();
    let mut sf = StateFactory::new(&Config::default(), TrieOpts::Precreated(trie)).unwrap();
    sf.start().unwrap();

    let a = addr(1);
    sf.create_account(&a, amount(5)).unwrap();
    sf.commit_state_changes(0, &[], &[], &[]).unwrap();
    assert_eq!(sf.balance(&a).unwrap(), amount(5));
}

#[test]
fn test_restart_recovers_height_and_candidates() {
    let dir = TempDir::new().unwrap();
    let cfg = Config {
        trie_db_path: dir.path().to_string_lossy().into_owned(),
        num_candidates: 36,
    };
    let c = addr(3);

    {
        let mut sf = StateFactory::new(&cfg, TrieOpts::Default).unwrap();
        sf.start().unwrap();
        sf.create_account(&c, amount(50)).unwrap();
        sf.commit_state_changes(0, &[], &[Vote::new(&c, &c, 1, b"pk-c")], &[])
            .unwrap();
        sf.stop();
    }

    let mut sf = StateFactory::new(&cfg, TrieOpts::Default).unwrap();
    sf.start().unwrap();

    assert_eq!(sf.height().unwrap(), 0);
    assert_eq!(sf.balance(&c).unwrap(), amount(50));
    let archived = sf.candidates_by_height(0).unwrap();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].address, c);

    // the first commit after restart rebuilds the live pool from the
    // previous archive
    sf.commit_state_changes(1, &[], &[], &[]).unwrap();
    let (height, pool) = sf.candidates();
    assert_eq!(height, 1);
    assert_eq!(pool.len(), 1);
    assert_eq!(pool[0].address, c);
    assert_eq!(pool[0].votes, BigInt::from(50));
}

#[test]
fn test_contract_lifecycle_through_commit() {
    let owner = addr(1);
    let contract_addr = addr(9);
    let mut sf = factory();

    sf.create_account(&owner, amount(100)).unwrap();
    sf.create_account(&contract_addr, amount(0)).unwrap();

    let hash: dpos_state::AddrHash = [9; 20];
    sf.set_code(&hash, b"bytecode").unwrap();
    let key = [0x01; 32];
    let value = [0x02; 32];
    sf.set_contract_state(&hash, &key, &value).unwrap();
    sf.commit_state_changes(0, &[], &[], &[]).unwrap();

    // the committed record is a contract with a non-empty storage root
    let committed = sf.state(&contract_addr).unwrap();
    assert!(committed.is_contract());
    assert_ne!(committed.root, EMPTY_ROOT);

    // the handle cache was dropped at commit; reads reload from the trie
    assert_eq!(sf.get_code(&hash).unwrap(), b"bytecode".to_vec());
    assert_eq!(sf.get_contract_state(&hash, &key).unwrap(), value);
}
