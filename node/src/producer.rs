//! Block production
//!
//! One tick every ~10 seconds: refresh eligible miners from the session
//! set, assign deterministic wait times, simulate proof submission,
//! select 12 speed + lottery-fill to 19 winners, assemble the block,
//! apply state transitions atomically under the store lock, hand the
//! block to zero-history, then persist outside the lock. A round with
//! zero eligible miners produces nothing and does not advance height.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use lac_consensus::{poet, MiningCoordinator, RoundOutcome};
use lac_crypto::SigningKeys;
use lac_state::store::StateStore;
use lac_state::{compute_block_hash, Block, LedgerState, RewardRecord, Transaction};
use lac_zero_history::{AccountSnapshot, ZeroHistoryManager};
use tracing::{debug, error, info, warn};

use crate::error::{NodeError, NodeResult};
use crate::hooks::{is_special, TxHooks};

/// Producer limits
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Mempool transactions per block
    pub max_txs_per_block: usize,
    /// Ephemeral messages per block
    pub max_msgs_per_block: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            max_txs_per_block: 50,
            max_msgs_per_block: 20,
        }
    }
}

/// Deterministic block assembly from the queues
pub struct BlockAssembler {
    config: ProducerConfig,
}

impl BlockAssembler {
    /// Assembler with the given limits
    pub fn new(config: ProducerConfig) -> Self {
        Self { config }
    }

    /// Drain the queues and materialize the next block. The canonical
    /// hash covers the mempool transaction count; pending items ride
    /// along.
    pub fn assemble(&self, ledger: &mut LedgerState, timestamp: u64, difficulty: f64) -> Block {
        let index = ledger.height() + 1;
        let previous_hash = ledger.tip_hash();

        let mempool_txs = ledger.mempool.take(self.config.max_txs_per_block);
        let mempool_count = mempool_txs.len();
        let mut transactions = mempool_txs;
        transactions.extend(ledger.pending_txs.drain());

        let take = self.config.max_msgs_per_block.min(ledger.ephemeral_msgs.len());
        let ephemeral_msgs: Vec<_> = ledger.ephemeral_msgs.drain(..take).collect();

        let hash = compute_block_hash(index, &previous_hash, timestamp, mempool_count, 0);

        Block {
            index,
            timestamp,
            previous_hash,
            transactions,
            ephemeral_msgs,
            nonce: 0,
            miner: "poet_anonymous".to_string(),
            difficulty,
            hash,
            mining_winners_count: 0,
            total_reward: 0.0,
            mining_rewards: Vec::new(),
        }
    }
}

/// The block production loop body
pub struct BlockProducer {
    store: Arc<StateStore>,
    coordinator: MiningCoordinator,
    zero_history: ZeroHistoryManager,
    assembler: BlockAssembler,
    hooks: Arc<dyn TxHooks>,
    /// Seeds of validators this node can witness-sign for
    witness_seeds: HashMap<String, String>,
}

impl BlockProducer {
    /// Build a producer over the store
    pub fn new(
        store: Arc<StateStore>,
        coordinator: MiningCoordinator,
        zero_history: ZeroHistoryManager,
        config: ProducerConfig,
        hooks: Arc<dyn TxHooks>,
    ) -> Self {
        Self {
            store,
            coordinator,
            zero_history,
            assembler: BlockAssembler::new(config),
            hooks,
            witness_seeds: HashMap::new(),
        }
    }

    /// Register a validator whose seed this node holds. The wallet's
    /// level and balance gate eligibility; the wallet's signing key
    /// becomes the witness key.
    pub fn register_local_validator(&mut self, seed: &str, now: u64) -> NodeResult<String> {
        let (address, _) = self.store.register_wallet(seed, now)?;
        let (level, stake) = {
            let guard = self.store.lock();
            let wallet = &guard.wallets[&address];
            (wallet.level, wallet.balance)
        };
        let pubkey = SigningKeys::from_seed(seed).public_hex();
        self.zero_history
            .register_validator(&address, level, stake, Some(pubkey), now)?;
        self.witness_seeds.insert(address.clone(), seed.to_string());
        Ok(address)
    }

    /// Direct access to the zero-history manager (stats, bootstrap)
    pub fn zero_history(&self) -> &ZeroHistoryManager {
        &self.zero_history
    }

    /// Mutable access for wiring (trusted checkpoints, marks)
    pub fn zero_history_mut(&mut self) -> &mut ZeroHistoryManager {
        &mut self.zero_history
    }

    /// One production tick. Returns the produced block, or `None` when
    /// no miner was eligible.
    pub fn produce_once(&mut self, now: u64) -> NodeResult<Option<Block>> {
        let store = self.store.clone();
        let produced = {
            let mut guard = store.lock();
            self.produce_locked(&mut guard, now)?
        };

        let Some(block) = produced else {
            return Ok(None);
        };

        // Persistence happens outside the lock; broadcast is the
        // caller's job and must come after this returns.
        self.store.persist_all(now)?;
        self.zero_history.save(self.store.datadir())?;

        info!(
            "block #{} mined: {} txs, {} winners, {:.1} LAC",
            block.index,
            block.transactions.len(),
            block.mining_winners_count,
            block.total_reward
        );
        Ok(Some(block))
    }

    fn produce_locked(&mut self, ledger: &mut LedgerState, now: u64) -> NodeResult<Option<Block>> {
        let previous_hash = ledger.tip_hash();
        let next_index = ledger.height() + 1;
        self.coordinator.poet.height = next_index;

        // Eligible miners: active sessions with a funded wallet
        let candidates: Vec<(String, u8, f64, u64)> = ledger
            .sessions
            .keys()
            .filter_map(|addr| {
                ledger
                    .wallets
                    .get(addr)
                    .map(|w| (addr.clone(), w.level, w.balance, w.created_at))
            })
            .filter(|(_, _, balance, _)| *balance >= poet::MIN_MINING_BALANCE)
            .collect();

        if candidates.is_empty() {
            debug!("no eligible miners, skipping block");
            return Ok(None);
        }

        for (address, level, balance, created_at) in &candidates {
            let outcome = self.coordinator.register_miner(
                address,
                *level,
                *balance,
                *created_at,
                &previous_hash,
                now,
            )?;
            // Simulated proof: the miner waited exactly its window
            self.coordinator
                .submit_proof(address, outcome.wait_time, now)?;
            if *level >= poet::MAX_LEVEL {
                // Level 7 submits a second proof
                self.coordinator
                    .submit_proof(address, outcome.wait_time, now)?;
            }
        }

        let round = self.coordinator.mine_round(now);
        let mut block = self.assembler.assemble(ledger, now, round.difficulty);

        self.apply_block(ledger, &mut block, &round, now)?;
        ledger.chain.push(block.clone());

        self.hooks.after_block(block.index, ledger);

        // Zero-history ingest, pruning and (maybe) a commitment
        let accounts: AccountSnapshot = account_snapshot(ledger);
        let utxo_delta: HashMap<String, f64> = round.rewards.clone();
        let spent_key_images: Vec<String> = block
            .transactions
            .iter()
            .filter_map(|tx| tx.key_image().map(String::from))
            .collect();

        let seeds = self.witness_seeds.clone();
        let signer = move |address: &str, message: &[u8]| {
            seeds
                .get(address)
                .map(|seed| SigningKeys::from_seed(seed).sign(message))
        };
        let commitment = self.zero_history.add_block(
            &block,
            utxo_delta,
            spent_key_images,
            &accounts,
            now,
            &signer,
        )?;

        if let Some(outcome) = commitment {
            if let Some(fraud) = &outcome.fraud {
                warn!(
                    "commitment rejected for fraud: {:?} by {}",
                    fraud.proof_type, fraud.validator_address
                );
            } else {
                let (leader, leader_reward) = &outcome.leader_reward;
                Self::credit(ledger, leader, *leader_reward, now);
                for (witness, reward) in &outcome.witness_rewards {
                    Self::credit(ledger, witness, *reward, now);
                }
                debug!(
                    "commitment rewards: leader {leader} +{leader_reward}, {} witnesses",
                    outcome.witness_rewards.len()
                );
            }
        }

        if let Err(e) = ledger.audit() {
            error!("post-block audit failed: {e}");
        }

        Ok(Some(block))
    }

    /// Apply a block's transactions and rewards to ledger state.
    fn apply_block(
        &self,
        ledger: &mut LedgerState,
        block: &mut Block,
        round: &RoundOutcome,
        now: u64,
    ) -> NodeResult<()> {
        // Ring-bearing transactions: record key images, and treat a
        // duplicate within our own block as fatal.
        let mut seen_in_block: HashSet<String> = HashSet::new();
        for tx in &block.transactions {
            if let Some(image) = tx.key_image() {
                if !seen_in_block.insert(image.to_string()) {
                    return Err(NodeError::KeyImageConflict(image.to_string()));
                }
                // Build paths insert images eagerly; peer-received
                // transactions are recorded here.
                ledger.spent_key_images.insert(image.to_string());
            }
        }

        for tx in &block.transactions {
            if is_special(tx) {
                self.hooks.process(tx, block.index, ledger);
            }
        }

        // Winner rewards. Level 7 wallets earn double.
        let mut paid_records = Vec::new();
        let mut emission = 0.0;
        for (address, reward) in &round.rewards {
            let Some(wallet) = ledger.wallets.get_mut(address) else {
                continue;
            };
            let actual = if wallet.level >= poet::MAX_LEVEL {
                reward * 2.0
            } else {
                *reward
            };
            wallet.balance += actual;
            wallet.record_win(block.index, actual, now);
            emission += actual;
            paid_records.push(RewardRecord {
                address: address.clone(),
                reward: actual,
            });
        }
        ledger.counters.emitted_mining += emission;

        block.mining_rewards = paid_records;
        block.mining_winners_count = round.unique_winners;
        block.total_reward = emission;
        Ok(())
    }

    fn credit(ledger: &mut LedgerState, address: &str, amount: f64, now: u64) {
        if amount <= 0.0 {
            return;
        }
        if let Some(wallet) = ledger.wallets.get_mut(address) {
            wallet.balance += amount;
            wallet.last_activity = now;
            ledger.counters.emitted_mining += amount;
        }
    }
}

/// Snapshot of the full account set for commitments
pub fn account_snapshot(ledger: &LedgerState) -> BTreeMap<String, f64> {
    ledger
        .wallets
        .iter()
        .map(|(addr, w)| (addr.clone(), w.balance))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NullHooks;
    use lac_consensus::Poet;
    use lac_zero_history::ZeroHistoryConfig;
    use tempfile::tempdir;

    const MINER_A: &str = "miner alpha seed 123456789012345";
    const MINER_B: &str = "miner beta seed 1234567890123456";

    fn producer_over(dir: &std::path::Path) -> (Arc<StateStore>, BlockProducer) {
        let store = Arc::new(StateStore::open(dir, 1_000).unwrap());
        let coordinator = MiningCoordinator::new(Poet::new(1, 1.0, 0.0));
        let zero_history = ZeroHistoryManager::new(ZeroHistoryConfig::dev());
        let producer = BlockProducer::new(
            store.clone(),
            coordinator,
            zero_history,
            ProducerConfig::default(),
            Arc::new(NullHooks),
        );
        (store, producer)
    }

    #[test]
    fn test_no_eligible_miners_no_block() {
        let dir = tempdir().unwrap();
        let (store, mut producer) = producer_over(dir.path());

        let result = producer.produce_once(2_000).unwrap();
        assert!(result.is_none());
        assert_eq!(store.lock().height(), 0);
    }

    #[test]
    fn test_session_below_minimum_not_eligible() {
        let dir = tempdir().unwrap();
        let (store, mut producer) = producer_over(dir.path());
        store.register_wallet(MINER_A, 1_000).unwrap();
        store.faucet(MINER_A, 10.0, 1_000).unwrap(); // below 50
        store.login(MINER_A, 1_500).unwrap();

        assert!(producer.produce_once(2_000).unwrap().is_none());
    }

    #[test]
    fn test_block_produced_with_eligible_miner() {
        let dir = tempdir().unwrap();
        let (store, mut producer) = producer_over(dir.path());
        let (addr, _) = store.register_wallet(MINER_A, 1_000).unwrap();
        store.faucet(MINER_A, 100.0, 1_000).unwrap();
        store.login(MINER_A, 1_500).unwrap();

        let block = producer.produce_once(2_000).unwrap().unwrap();
        assert_eq!(block.index, 1);
        assert!(block.total_reward > 0.0);

        let guard = store.lock();
        assert_eq!(guard.height(), 1);
        // faucet tx made it into the block
        assert!(block
            .transactions
            .iter()
            .any(|tx| matches!(tx, Transaction::Faucet { .. })));
        // winner credited and history recorded
        let wallet = &guard.wallets[&addr];
        assert!(wallet.balance > 100.0);
        assert!(!wallet.mining_history.is_empty());
        guard.audit().unwrap();
    }

    #[test]
    fn test_chain_links_across_blocks() {
        let dir = tempdir().unwrap();
        let (store, mut producer) = producer_over(dir.path());
        store.register_wallet(MINER_A, 1_000).unwrap();
        store.register_wallet(MINER_B, 1_000).unwrap();
        store.faucet(MINER_A, 100.0, 1_000).unwrap();
        store.faucet(MINER_B, 100.0, 1_000).unwrap();
        store.login(MINER_A, 1_500).unwrap();
        store.login(MINER_B, 1_500).unwrap();

        for i in 0..5 {
            producer.produce_once(2_000 + i * 10).unwrap().unwrap();
        }

        let guard = store.lock();
        assert_eq!(guard.height(), 5);
        guard.audit().unwrap();
        for window in guard.chain.windows(2) {
            assert!(window[1].links_to(&window[0]));
        }
    }

    #[test]
    fn test_assembler_respects_limits() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path(), 1_000).unwrap();
        let mut guard = store.lock();
        for i in 0..80 {
            guard.mempool.push(Transaction::Faucet {
                to: format!("lac1x{i}"),
                amount: 1.0,
                timestamp: 1_000,
            });
        }

        let assembler = BlockAssembler::new(ProducerConfig::default());
        let block = assembler.assemble(&mut guard, 2_000, 1.0);
        assert_eq!(block.transactions.len(), 50);
        assert_eq!(guard.mempool.len(), 30);
        assert!(block.verify_hash());
    }
}
