//! The state factory: applies block actions to cached state and
//! batch-commits the result into the account and candidate tries.

use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use tracing::{debug, info, warn};

use dpos_mpt::{Hash256, Trie, EMPTY_ROOT};
use dpos_storage::{KvStore, MemoryStore, RocksStore};

use crate::account::Account;
use crate::action::{Execution, Transfer, Vote};
use crate::address::{self, AddrHash};
use crate::candidate::{candidates_to_map, map_to_candidates, sort_candidates, Candidate};
use crate::codec;
use crate::config::Config;
use crate::contract::Contract;
use crate::error::{StateError, StateResult};

/// Namespace of the account trie and the height/root records.
pub const NS_ACCOUNT: &str = "Account";
/// Namespace of the candidate trie.
pub const NS_CANDIDATE: &str = "Candidate";
/// Namespace of all contract storage tries.
pub const NS_CONTRACT: &str = "Contract";

/// Key of the persisted account-trie root.
pub const KEY_ACCOUNT_TRIE_ROOT: &[u8] = b"AccountTrieRoot";
/// Key of the persisted candidate-trie root.
pub const KEY_CANDIDATE_TRIE_ROOT: &[u8] = b"CandidateTrieRoot";
/// Key of the persisted chain height (8 bytes, big-endian).
pub const KEY_CURRENT_HEIGHT: &[u8] = b"CurrentHeight";

/// How the factory obtains its account trie. Exactly one option is chosen
/// at construction.
pub enum TrieOpts {
    /// Use a trie the caller already opened.
    Precreated(Trie),
    /// Open a RocksDB store at `Config::trie_db_path`.
    Default,
    /// Ephemeral in-memory store.
    InMemory,
}

/// The authoritative world-state engine.
///
/// A single writer (the block processor) drives the factory: actions
/// mutate the in-memory caches, then [`StateFactory::commit_state_changes`]
/// flushes everything into the tries and persists the new roots and
/// height. Reads of committed state go straight to the account trie.
pub struct StateFactory {
    current_height: u64,
    num_candidates: usize,
    cached_candidates: HashMap<String, Candidate>,
    cached_accounts: HashMap<String, Account>,
    cached_contracts: HashMap<AddrHash, Contract>,
    account_trie: Trie,
    candidate_trie: Option<Trie>,
    db: Arc<dyn KvStore>,
}

impl StateFactory {
    /// Builds a factory over the trie chosen by `opts`.
    pub fn new(cfg: &Config, opts: TrieOpts) -> StateResult<Self> {
        let (db, account_trie) = match opts {
            TrieOpts::Precreated(trie) => (trie.database(), trie),
            TrieOpts::Default => {
                if cfg.trie_db_path.is_empty() {
                    return Err(StateError::Config("trie db path is empty".to_string()));
                }
                let db: Arc<dyn KvStore> = Arc::new(RocksStore::open(&cfg.trie_db_path)?);
                let root = read_root(db.as_ref(), NS_ACCOUNT, KEY_ACCOUNT_TRIE_ROOT)?;
                let trie = Trie::new(Arc::clone(&db), NS_ACCOUNT, root)?;
                (db, trie)
            }
            TrieOpts::InMemory => {
                let db: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
                let trie = Trie::new(Arc::clone(&db), NS_ACCOUNT, EMPTY_ROOT)?;
                (db, trie)
            }
        };
        Ok(Self {
            current_height: 0,
            num_candidates: cfg.num_candidates,
            cached_candidates: HashMap::new(),
            cached_accounts: HashMap::new(),
            cached_contracts: HashMap::new(),
            account_trie,
            candidate_trie: None,
            db,
        })
    }

    /// Opens the candidate trie at its persisted root and reconciles the
    /// height record against the candidate archives.
    pub fn start(&mut self) -> StateResult<()> {
        if self.candidate_trie.is_none() {
            let root = read_root(self.db.as_ref(), NS_CANDIDATE, KEY_CANDIDATE_TRIE_ROOT)?;
            self.candidate_trie = Some(Trie::new(Arc::clone(&self.db), NS_CANDIDATE, root)?);
        }
        self.reconcile_height()?;
        self.current_height = self.height()?;
        info!(target: "dpos::state", height = self.current_height, "state factory started");
        Ok(())
    }

    /// Releases the candidate trie. Nothing is flushed: pending state at
    /// shutdown is a caller bug, committed or discarded beforehand.
    pub fn stop(&mut self) {
        info!(target: "dpos::state", height = self.current_height, "state factory stopped");
        self.candidate_trie = None;
    }

    // The height record is written after the trie roots, so a crash in
    // between leaves archives one block ahead of the record. Trust the
    // persisted roots and roll the record forward to match.
    fn reconcile_height(&mut self) -> StateResult<()> {
        let persisted = self.height()?;
        let mut height = persisted;
        let trie = self.candidate_trie.as_mut().ok_or(StateError::NotStarted)?;
        while trie.get(&(height + 1).to_be_bytes())?.is_some() {
            height += 1;
        }
        if height != persisted {
            warn!(
                target: "dpos::state",
                from = persisted,
                to = height,
                "rolling height record forward to match candidate archives"
            );
            self.db
                .put(NS_ACCOUNT, KEY_CURRENT_HEIGHT, &height.to_be_bytes())?;
        }
        Ok(())
    }

    //
    // Accounts
    //

    /// Returns the cached record for `address`, materializing a fresh one
    /// with `init` balance when neither the cache nor the trie has it.
    pub fn load_or_create_account(&mut self, address: &str, init: BigUint) -> StateResult<Account> {
        Ok(self.load_or_create(address, init)?.clone())
    }

    /// Creates a fresh account with `init` balance; fails with
    /// [`StateError::AccountCollision`] when the address already exists.
    pub fn create_account(&mut self, address: &str, init: BigUint) -> StateResult<Account> {
        let hash = address::pubkey_hash(address)?;
        if self.cached_accounts.contains_key(address) || self.get_state_by_hash(&hash)?.is_some() {
            return Err(StateError::AccountCollision(address.to_string()));
        }
        let record = Account::with_balance(init);
        self.cached_accounts
            .insert(address.to_string(), record.clone());
        Ok(record)
    }

    /// Reads the committed record for `address` straight from the account
    /// trie, without touching the cache.
    pub fn state(&mut self, address: &str) -> StateResult<Account> {
        let hash = address::pubkey_hash(address)?;
        self.get_state_by_hash(&hash)?
            .ok_or_else(|| StateError::AccountNotFound(address.to_string()))
    }

    /// Returns the in-flight view of `address`: the contract self-state if
    /// a handle exists, else the cached account, else a record read from
    /// the trie (materialized into the cache).
    pub fn cached_state(&mut self, address: &str) -> StateResult<Account> {
        let hash = address::pubkey_hash(address)?;
        if let Some(contract) = self.cached_contracts.get(&hash) {
            return Ok(contract.self_state().clone());
        }
        if let Some(account) = self.cached_accounts.get(address) {
            return Ok(account.clone());
        }
        Ok(self.load_or_create(address, BigUint::zero())?.clone())
    }

    /// Committed balance of `address`.
    pub fn balance(&mut self, address: &str) -> StateResult<BigUint> {
        Ok(self.state(address)?.balance)
    }

    /// Committed nonce of `address`.
    pub fn nonce(&mut self, address: &str) -> StateResult<u64> {
        Ok(self.state(address)?.nonce)
    }

    /// Account-trie root over the current in-memory state, committed or
    /// not.
    pub fn root_hash(&self) -> Hash256 {
        self.account_trie.root_hash()
    }

    /// Persisted chain height; 0 before the first commit.
    pub fn height(&self) -> StateResult<u64> {
        match self.db.get(NS_ACCOUNT, KEY_CURRENT_HEIGHT)? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StateError::Decoding("height record is not 8 bytes".to_string())
                })?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(0),
        }
    }

    //
    // Commit pipeline
    //

    /// Applies a block's actions and durably commits the result.
    ///
    /// Order is fixed: transfers, votes, account flush, contract flush,
    /// execution nonce bumps, account-trie batch commit, candidate archive
    /// and batch commit, then the root and height records. Any failure
    /// aborts the commit; in-memory caches are left as-is and the caller
    /// is expected to discard the factory.
    pub fn commit_state_changes(
        &mut self,
        block_height: u64,
        transfers: &[Transfer],
        votes: &[Vote],
        executions: &[Execution],
    ) -> StateResult<()> {
        if self.candidate_trie.is_none() {
            return Err(StateError::NotStarted);
        }
        if self.current_height > 0 && block_height <= self.current_height {
            warn!(
                target: "dpos::state",
                block_height,
                current = self.current_height,
                "commit height does not advance the chain"
            );
        }
        // rebuild the live pool from the previous archive after a restart
        if block_height > 0 && self.cached_candidates.is_empty() {
            let archived = self.read_candidates(block_height - 1)?;
            self.cached_candidates = candidates_to_map(archived);
            debug!(
                target: "dpos::state",
                height = block_height - 1,
                candidates = self.cached_candidates.len(),
                "recovered candidate pool from archive"
            );
        }

        self.handle_transfers(transfers)?;
        self.handle_votes(block_height, votes)?;

        let accounts: Vec<(String, Account)> = self
            .cached_accounts
            .iter()
            .map(|(address, account)| (address.clone(), account.clone()))
            .collect();
        for (address, account) in &accounts {
            let hash = address::pubkey_hash(address)?;
            self.put_state(&hash, account)?;

            if !account.is_candidate {
                self.cached_candidates.remove(address);
                continue;
            }
            // a self-voter endorses itself with its own balance on top of
            // the weight contributed by others
            let mut total = account.voting_weight.clone();
            if account.votee == *address {
                total += BigInt::from(account.balance.clone());
            }
            self.update_candidate(address, total, block_height);
        }

        // flush each contract's storage trie, then store the root-updated
        // record; storage tries are disjoint, so order does not matter
        for (hash, contract) in self.cached_contracts.iter_mut() {
            contract.commit()?;
            let bytes = codec::encode_account(contract.self_state())?;
            self.account_trie.upsert(hash, &bytes)?;
        }

        self.handle_executions(executions)?;

        let account_root = self.account_trie.commit()?;

        let mut candidates = map_to_candidates(&self.cached_candidates);
        sort_candidates(&mut candidates);
        let bytes = codec::encode_candidates(&candidates)?;
        let candidate_trie = self.candidate_trie.as_mut().ok_or(StateError::NotStarted)?;
        candidate_trie.upsert(&block_height.to_be_bytes(), &bytes)?;
        let candidate_root = candidate_trie.commit()?;

        self.db
            .put(NS_ACCOUNT, KEY_ACCOUNT_TRIE_ROOT, &account_root)?;
        self.db
            .put(NS_CANDIDATE, KEY_CANDIDATE_TRIE_ROOT, &candidate_root)?;
        self.db
            .put(NS_ACCOUNT, KEY_CURRENT_HEIGHT, &block_height.to_be_bytes())?;

        self.current_height = block_height;
        self.cached_accounts.clear();
        self.cached_contracts.clear();
        info!(
            target: "dpos::state",
            height = block_height,
            account_root = %hex::encode(account_root),
            candidate_root = %hex::encode(candidate_root),
            transfers = transfers.len(),
            votes = votes.len(),
            executions = executions.len(),
            "state changes committed"
        );
        Ok(())
    }

    //
    // Contracts
    //

    /// Installs `code` on `addr`, promoting a cached plain account into a
    /// contract handle. The account must already exist.
    pub fn set_code(&mut self, addr: &AddrHash, code: &[u8]) -> StateResult<()> {
        let address = address::to_address(addr);
        let mut account = match self.cached_accounts.remove(&address) {
            // promoted out of the plain cache so commit writes it once
            Some(account) => account,
            None => self
                .get_state_by_hash(addr)?
                .ok_or(StateError::AccountNotFound(address))?,
        };
        account.root = EMPTY_ROOT;
        let storage = Trie::new(Arc::clone(&self.db), NS_CONTRACT, EMPTY_ROOT)?;
        let mut contract = Contract::new(account, storage);
        contract.set_code(code)?;
        self.cached_contracts.insert(*addr, contract);
        Ok(())
    }

    /// Code hash of the contract at `addr`.
    pub fn get_code_hash(&mut self, addr: &AddrHash) -> StateResult<Hash256> {
        Ok(self.get_contract(addr)?.self_state().code_hash)
    }

    /// Code of the contract at `addr`.
    pub fn get_code(&mut self, addr: &AddrHash) -> StateResult<Vec<u8>> {
        let address = address::to_address(addr);
        self.get_contract(addr)?
            .code()?
            .ok_or(StateError::ContractNotFound(address))
    }

    /// Reads a 32-byte slot of the contract at `addr`.
    pub fn get_contract_state(&mut self, addr: &AddrHash, key: &Hash256) -> StateResult<Hash256> {
        self.get_contract(addr)?.get_state(key)
    }

    /// Writes a 32-byte slot of the contract at `addr`.
    pub fn set_contract_state(
        &mut self,
        addr: &AddrHash,
        key: &Hash256,
        value: &Hash256,
    ) -> StateResult<()> {
        self.get_contract(addr)?.set_state(key, value)
    }

    //
    // Candidate pool
    //

    /// The live pool, sorted and truncated, with the height it reflects.
    pub fn candidates(&self) -> (u64, Vec<Candidate>) {
        let mut candidates = map_to_candidates(&self.cached_candidates);
        sort_candidates(&mut candidates);
        candidates.truncate(self.num_candidates);
        (self.current_height, candidates)
    }

    /// The archived pool at `height`, truncated to the configured cap.
    pub fn candidates_by_height(&mut self, height: u64) -> StateResult<Vec<Candidate>> {
        let mut candidates = self.read_candidates(height)?;
        candidates.truncate(self.num_candidates);
        Ok(candidates)
    }

    //
    // Internal: accounts
    //

    fn get_state_by_hash(&mut self, hash: &AddrHash) -> StateResult<Option<Account>> {
        match self.account_trie.get(hash)? {
            Some(bytes) => Ok(Some(codec::decode_account(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_state(&mut self, hash: &AddrHash, account: &Account) -> StateResult<()> {
        let bytes = codec::encode_account(account)?;
        self.account_trie.upsert(hash, &bytes)?;
        Ok(())
    }

    fn load_or_create(&mut self, address: &str, init: BigUint) -> StateResult<&mut Account> {
        if !self.cached_accounts.contains_key(address) {
            let hash = address::pubkey_hash(address)?;
            let record = match self.get_state_by_hash(&hash)? {
                Some(record) => record,
                None => Account::with_balance(init),
            };
            self.cached_accounts.insert(address.to_string(), record);
        }
        self.cached_accounts
            .get_mut(address)
            .ok_or_else(|| StateError::AccountNotFound(address.to_string()))
    }

    //
    // Internal: appliers
    //

    fn handle_transfers(&mut self, transfers: &[Transfer]) -> StateResult<()> {
        for tx in transfers {
            if tx.is_contract_call() {
                continue;
            }
            if !tx.is_coinbase {
                let sender = self.load_or_create(&tx.sender, BigUint::zero())?;
                if tx.amount > sender.balance {
                    return Err(StateError::InsufficientBalance);
                }
                sender.sub_balance(&tx.amount)?;
                if tx.nonce > sender.nonce {
                    sender.nonce = tx.nonce;
                }
                // the sender's balance dropped, and with it the
                // endorsement it contributes
                let votee = sender.votee.clone();
                if !votee.is_empty() && votee != tx.sender {
                    let endorsee = self.load_or_create(&votee, BigUint::zero())?;
                    endorsee.voting_weight -= BigInt::from(tx.amount.clone());
                }
            }
            let recipient = self.load_or_create(&tx.recipient, BigUint::zero())?;
            recipient.add_balance(&tx.amount);
            let votee = recipient.votee.clone();
            if !votee.is_empty() && votee != tx.recipient {
                let endorsee = self.load_or_create(&votee, BigUint::zero())?;
                endorsee.voting_weight += BigInt::from(tx.amount.clone());
            }
        }
        Ok(())
    }

    fn handle_votes(&mut self, block_height: u64, votes: &[Vote]) -> StateResult<()> {
        for vote in votes {
            let voter = self.load_or_create(&vote.voter, BigUint::zero())?;
            if vote.nonce > voter.nonce {
                voter.nonce = vote.nonce;
            }
            let prior_votee = voter.votee.clone();
            let voter_balance = voter.balance.clone();

            // the weight contributed to the prior endorsee was the
            // voter's entire balance
            if !prior_votee.is_empty() && prior_votee != vote.voter {
                let old_votee = self.load_or_create(&prior_votee, BigUint::zero())?;
                old_votee.voting_weight -= BigInt::from(voter_balance.clone());
                self.load_or_create(&vote.voter, BigUint::zero())?.votee.clear();
            }

            if vote.votee.is_empty() {
                // unvote
                self.load_or_create(&vote.voter, BigUint::zero())?.is_candidate = false;
                continue;
            }

            if vote.voter != vote.votee {
                let votee = self.load_or_create(&vote.votee, BigUint::zero())?;
                votee.voting_weight += BigInt::from(voter_balance);
                self.load_or_create(&vote.voter, BigUint::zero())?.votee = vote.votee.clone();
            } else {
                // self-nomination
                let voter = self.load_or_create(&vote.voter, BigUint::zero())?;
                voter.votee = vote.votee.clone();
                voter.is_candidate = true;
                if !self.cached_candidates.contains_key(&vote.voter) {
                    self.cached_candidates.insert(
                        vote.voter.clone(),
                        Candidate::new(
                            vote.voter.clone(),
                            vote.voter_public_key.clone(),
                            block_height,
                        ),
                    );
                }
            }
        }
        Ok(())
    }

    fn handle_executions(&mut self, executions: &[Execution]) -> StateResult<()> {
        for execution in executions {
            let hash = address::pubkey_hash(&execution.executor)?;
            if let Some(state) = self.cached_accounts.get_mut(&execution.executor) {
                state.nonce += 1;
                if execution.nonce > state.nonce {
                    state.nonce = execution.nonce;
                }
                let bytes = codec::encode_account(state)?;
                self.account_trie.upsert(&hash, &bytes)?;
                continue;
            }
            let mut state = self
                .get_state_by_hash(&hash)?
                .ok_or_else(|| StateError::AccountNotFound(execution.executor.clone()))?;
            state.nonce += 1;
            if execution.nonce > state.nonce {
                state.nonce = execution.nonce;
            }
            self.put_state(&hash, &state)?;
        }
        Ok(())
    }

    //
    // Internal: contracts
    //

    fn get_contract(&mut self, addr: &AddrHash) -> StateResult<&mut Contract> {
        if !self.cached_contracts.contains_key(addr) {
            let account = self
                .get_state_by_hash(addr)?
                .ok_or_else(|| StateError::AccountNotFound(address::to_address(addr)))?;
            if !account.is_contract() {
                return Err(StateError::ContractNotFound(address::to_address(addr)));
            }
            let storage = Trie::new(Arc::clone(&self.db), NS_CONTRACT, account.root)?;
            self.cached_contracts
                .insert(*addr, Contract::new(account, storage));
        }
        self.cached_contracts
            .get_mut(addr)
            .ok_or_else(|| StateError::ContractNotFound(address::to_address(addr)))
    }

    //
    // Internal: candidates
    //

    fn update_candidate(&mut self, address: &str, total_weight: BigInt, block_height: u64) {
        // only self-voters enter the pool
        match self.cached_candidates.get_mut(address) {
            Some(candidate) => {
                candidate.votes = total_weight;
                candidate.last_update_height = block_height;
            }
            None => warn!(
                target: "dpos::state",
                address,
                "candidate flag set but address missing from pool"
            ),
        }
    }

    fn read_candidates(&mut self, height: u64) -> StateResult<Vec<Candidate>> {
        let trie = self.candidate_trie.as_mut().ok_or(StateError::NotStarted)?;
        match trie.get(&height.to_be_bytes())? {
            Some(bytes) => Ok(codec::decode_candidates(&bytes)?),
            None => Err(StateError::HeightNotFound(height)),
        }
    }
}

fn read_root(db: &dyn KvStore, namespace: &str, key: &[u8]) -> StateResult<Hash256> {
    match db.get(namespace, key)? {
        Some(bytes) => Hash256::try_from(bytes.as_slice())
            .map_err(|_| StateError::Decoding("trie root record is not 32 bytes".to_string())),
        None => Ok(EMPTY_ROOT),
    }
}
