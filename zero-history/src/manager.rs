//! Zero-history manager
//!
//! Owns the tiers, validator registry, witness collector, fraud
//! detector, checkpoint policy and recovery log, and runs the per-block
//! lifecycle: ingest into L3, prune by age, clean up old commitments,
//! and every `commitment_interval` blocks drive a commitment through
//! witness collection. Wallet credits for commitment rewards are
//! returned to the caller; the manager never touches wallets itself.

use std::collections::HashMap;
use std::path::Path;

use lac_state::{persist, Block};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointPolicy;
use crate::commitment::{merkle_root_of, state_hash, utxo_root, AccountSnapshot, StateCommitment};
use crate::config::ZeroHistoryConfig;
use crate::errors::ZeroHistoryResult;
use crate::fraud::{FraudDetector, FraudProof};
use crate::recovery::RecoveryLog;
use crate::tiers::{L1Entry, L3Block, PruneStats, TierStore};
use crate::validator::ValidatorRegistry;
use crate::witness::WitnessCollector;

const L3_FILE: &str = "l3_blocks.json";
const L2_FILE: &str = "l2_blocks.json";
const L1_FILE: &str = "l1_commitments.json";
const FRAUD_FILE: &str = "fraud_proofs.json";
const VALIDATORS_FILE: &str = "zh_validators.json";
const META_FILE: &str = "zh_meta.json";

/// Signs a commitment hash on behalf of a local validator address.
/// Returns `None` when the address's key is not held locally.
pub type WitnessSigner<'a> = &'a dyn Fn(&str, &[u8]) -> Option<String>;

/// Result of a finalized (or fraud-rejected) commitment attempt
#[derive(Debug, Clone)]
pub struct CommitmentOutcome {
    /// The commitment (appended to L1 unless fraud was found)
    pub commitment: StateCommitment,
    /// Leader address and reward to credit
    pub leader_reward: (String, f64),
    /// Witness addresses and rewards to credit
    pub witness_rewards: Vec<(String, f64)>,
    /// Fraud found during the automatic check, if any
    pub fraud: Option<FraudProof>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManagerMeta {
    current_height: u64,
    last_commitment_height: u64,
    checkpoints: CheckpointPolicy,
    recovery: RecoveryLog,
}

/// The three-tier lifecycle driver
pub struct ZeroHistoryManager {
    pub config: ZeroHistoryConfig,
    pub tiers: TierStore,
    pub witness: WitnessCollector,
    pub validators: ValidatorRegistry,
    pub fraud: FraudDetector,
    pub checkpoints: CheckpointPolicy,
    pub recovery: RecoveryLog,
    /// Height of the newest ingested block
    pub current_height: u64,
    /// Height at which the last commitment attempt was made
    pub last_commitment_height: u64,
}

impl ZeroHistoryManager {
    /// Fresh manager
    pub fn new(config: ZeroHistoryConfig) -> Self {
        let witness = WitnessCollector::new(config.witness_timeout_secs);
        Self {
            config,
            tiers: TierStore::new(),
            witness,
            validators: ValidatorRegistry::new(),
            fraud: FraudDetector::new(),
            checkpoints: CheckpointPolicy::new(),
            recovery: RecoveryLog::new(),
            current_height: 0,
            last_commitment_height: 0,
        }
    }

    /// Load manager state from the data directory
    pub fn load(datadir: &Path, config: ZeroHistoryConfig) -> Self {
        let mut manager = Self::new(config);
        if let Some(l3) = persist::load_with_backup(datadir, L3_FILE) {
            manager.tiers.l3 = l3;
        }
        if let Some(l2) = persist::load_with_backup(datadir, L2_FILE) {
            manager.tiers.l2 = l2;
        }
        if let Some(l1) = persist::load_with_backup(datadir, L1_FILE) {
            manager.tiers.l1 = l1;
        }
        if let Some(proofs) = persist::load_with_backup(datadir, FRAUD_FILE) {
            manager.fraud.import(proofs);
        }
        if let Some(validators) = persist::load_with_backup(datadir, VALIDATORS_FILE) {
            manager.validators = validators;
        }
        if let Some(meta) = persist::load_with_backup::<ManagerMeta>(datadir, META_FILE) {
            manager.current_height = meta.current_height;
            manager.last_commitment_height = meta.last_commitment_height;
            manager.checkpoints = meta.checkpoints;
            manager.recovery = meta.recovery;
        }
        info!(
            "zero-history loaded: {} L3, {} L2, {} commitments, {} validators",
            manager.tiers.l3.len(),
            manager.tiers.l2.len(),
            manager.tiers.l1.len(),
            manager.validators.len()
        );
        manager
    }

    /// Persist manager state into the data directory
    pub fn save(&self, datadir: &Path) -> ZeroHistoryResult<()> {
        persist::save_atomic(datadir, L3_FILE, &self.tiers.l3)?;
        persist::save_atomic(datadir, L2_FILE, &self.tiers.l2)?;
        persist::save_atomic(datadir, L1_FILE, &self.tiers.l1)?;
        persist::save_atomic(datadir, FRAUD_FILE, &self.fraud.export())?;
        persist::save_atomic(datadir, VALIDATORS_FILE, &self.validators)?;
        let meta = ManagerMeta {
            current_height: self.current_height,
            last_commitment_height: self.last_commitment_height,
            checkpoints: self.checkpoints.clone(),
            recovery: self.recovery.clone(),
        };
        persist::save_atomic(datadir, META_FILE, &meta)?;
        Ok(())
    }

    /// Register a validator (level/stake gated)
    pub fn register_validator(
        &mut self,
        address: &str,
        level: u8,
        stake: f64,
        pubkey: Option<String>,
        now: u64,
    ) -> ZeroHistoryResult<()> {
        self.validators
            .register(&self.config, address, level, stake, pubkey, now)
    }

    /// Ingest a block: L3 insert, age pruning, commitment cleanup, and
    /// a commitment attempt when the interval is due. Returns the
    /// commitment outcome (rewards to credit) when one was attempted
    /// and finalized or fraud-rejected.
    pub fn add_block(
        &mut self,
        block: &Block,
        utxo_delta: HashMap<String, f64>,
        spent_key_images: Vec<String>,
        accounts: &AccountSnapshot,
        now: u64,
        signer: WitnessSigner<'_>,
    ) -> ZeroHistoryResult<Option<CommitmentOutcome>> {
        self.tiers
            .insert_l3(L3Block::from_block(block, utxo_delta, spent_key_images));
        self.current_height = block.index;

        self.prune(now);
        self.witness.cleanup_expired(now);

        let blocks_since = self.current_height - self.last_commitment_height;
        if blocks_since < self.config.commitment_interval {
            debug!(
                "block #{}: {} blocks until next commitment",
                self.current_height,
                self.config.commitment_interval - blocks_since
            );
            return Ok(None);
        }

        info!("commitment trigger at block #{}", self.current_height);
        let outcome = self.create_commitment(accounts, now, signer)?;
        self.last_commitment_height = self.current_height;
        Ok(outcome)
    }

    /// Age-based tier pruning plus checkpoint retention cleanup
    pub fn prune(&mut self, now: u64) -> PruneStats {
        let stats = self.tiers.prune(&self.config, now);
        let entries = std::mem::take(&mut self.tiers.l1);
        let (kept, _removed) = self.checkpoints.cleanup(&self.config, entries, now);
        self.tiers.l1 = kept;
        stats
    }

    /// Build a commitment over the uncommitted range, collect witness
    /// signatures, and finalize. `None` when validators or witnesses
    /// fall short; the next interval retries.
    pub fn create_commitment(
        &mut self,
        accounts: &AccountSnapshot,
        now: u64,
        signer: WitnessSigner<'_>,
    ) -> ZeroHistoryResult<Option<CommitmentOutcome>> {
        let active: Vec<_> = self
            .validators
            .active(now)
            .into_iter()
            .cloned()
            .collect();
        if active.len() < self.config.min_witnesses {
            warn!(
                "commitment skipped: {} active validators, need {}",
                active.len(),
                self.config.min_witnesses
            );
            return Ok(None);
        }

        let mut rng = rand::thread_rng();
        let Some(leader) = self.validators.select_leader(now, &mut rng) else {
            return Ok(None);
        };

        let height_start = self.last_commitment_height + 1;
        let height_end = self.current_height;
        let block_hashes: Vec<String> = self
            .tiers
            .l3_range(height_start, height_end)
            .iter()
            .map(|b| b.hash.clone())
            .collect();
        let merkle_root = merkle_root_of(&block_hashes);
        let utxo = utxo_root(accounts);
        let total_supply: f64 = accounts.values().sum();
        let commitment_hash = state_hash(height_end, &merkle_root, &utxo, total_supply);

        let request_id =
            self.witness
                .create_request(&commitment_hash, height_end, &leader.address, now);

        for validator in &active {
            let Some(signature) = signer(&validator.address, commitment_hash.as_bytes()) else {
                continue;
            };
            let Some(pubkey) = validator.pubkey.as_deref() else {
                debug!("validator {} has no registered pubkey", validator.address);
                continue;
            };
            if let Err(e) =
                self.witness
                    .add_signature(&request_id, &validator.address, &signature, pubkey, now)
            {
                debug!("witness signature from {} rejected: {e}", validator.address);
            }
        }

        let (signatures, addresses) = match self.witness.finalize(&request_id, self.config.min_witnesses) {
            Ok(collected) => collected,
            Err(e) => {
                warn!("commitment at #{height_end} dropped: {e}");
                return Ok(None);
            }
        };

        let commitment = StateCommitment {
            block_height: height_end,
            commitment_hash,
            merkle_root,
            utxo_root: utxo,
            total_supply,
            validator_address: leader.address.clone(),
            validator_level: leader.level,
            timestamp: now,
            witness_signatures: signatures,
            witness_addresses: addresses.clone(),
            previous_commitment: self.tiers.latest_commitment_hash(),
        };

        // Double-sign check against every kept commitment
        if let Some(proof) =
            self.fraud
                .detect_double_sign(&self.config, &self.tiers.l1, &commitment, now)?
        {
            self.validators
                .punish_fraud(&self.config, &commitment.validator_address, now);
            return Ok(Some(CommitmentOutcome {
                commitment,
                leader_reward: (leader.address, 0.0),
                witness_rewards: Vec::new(),
                fraud: Some(proof),
            }));
        }

        // Automatic fraud check against the real block range and
        // account snapshot
        let range = self.tiers.l3_range(height_start, height_end);
        if let Some(proof) = self
            .fraud
            .auto_detect(&self.config, &commitment, &range, accounts, now)?
        {
            self.validators
                .punish_fraud(&self.config, &commitment.validator_address, now);
            return Ok(Some(CommitmentOutcome {
                commitment,
                leader_reward: (leader.address, 0.0),
                witness_rewards: Vec::new(),
                fraud: Some(proof),
            }));
        }

        let leader_amount = self
            .validators
            .reward_leader(&self.config, &leader.address, now);
        let witness_rewards = self
            .validators
            .reward_witnesses(&self.config, &addresses, now);

        self.tiers.push_commitment(L1Entry {
            height_start,
            height_end,
            commitment: commitment.clone(),
            checkpoint: false,
        });
        self.recovery.record(height_end, &commitment.hash(), now);

        info!(
            "commitment finalized at #{height_end}: {} witnesses, leader {} (+{leader_amount} LAC)",
            commitment.witness_addresses.len(),
            leader.address
        );

        Ok(Some(CommitmentOutcome {
            commitment,
            leader_reward: (leader.address, leader_amount),
            witness_rewards,
            fraud: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lac_crypto::SigningKeys;
    use lac_state::compute_block_hash;
    use tempfile::tempdir;

    fn test_block(index: u64, previous_hash: &str, timestamp: u64) -> Block {
        let mut block = Block::genesis(timestamp);
        block.index = index;
        block.previous_hash = previous_hash.to_string();
        block.timestamp = timestamp;
        block.hash = compute_block_hash(index, previous_hash, timestamp, 0, 0);
        block
    }

    fn validator_set(n: usize) -> (HashMap<String, String>, Vec<(String, String)>) {
        // address → seed, plus (address, pubkey) pairs
        let mut seeds = HashMap::new();
        let mut registered = Vec::new();
        for i in 0..n {
            let seed = format!("validator seed number {i:02} xxxxxxxxx");
            let keys = SigningKeys::from_seed(&seed);
            let address = format!("lac1validator{i}");
            seeds.insert(address.clone(), seed);
            registered.push((address, keys.public_hex()));
        }
        (seeds, registered)
    }

    fn manager_with_validators(n: usize) -> (ZeroHistoryManager, HashMap<String, String>) {
        let mut manager = ZeroHistoryManager::new(ZeroHistoryConfig::dev());
        let (seeds, registered) = validator_set(n);
        for (address, pubkey) in registered {
            manager
                .register_validator(&address, 5, 1_000.0, Some(pubkey), 1_000)
                .unwrap();
        }
        (manager, seeds)
    }

    fn accounts() -> AccountSnapshot {
        [("lac1a".to_string(), 1_000.0), ("lac1b".to_string(), 500.0)]
            .into_iter()
            .collect()
    }

    fn run_blocks(
        manager: &mut ZeroHistoryManager,
        seeds: &HashMap<String, String>,
        from: u64,
        to: u64,
        now: u64,
    ) -> Vec<CommitmentOutcome> {
        let signer = |address: &str, message: &[u8]| {
            seeds
                .get(address)
                .map(|seed| SigningKeys::from_seed(seed).sign(message))
        };
        let mut outcomes = Vec::new();
        let mut previous_hash = "0".to_string();
        for height in from..=to {
            let block = test_block(height, &previous_hash, now + height);
            previous_hash = block.hash.clone();
            if let Some(outcome) = manager
                .add_block(&block, HashMap::new(), vec![], &accounts(), now + height, &signer)
                .unwrap()
            {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    #[test]
    fn test_commitment_every_ten_blocks_dev() {
        let (mut manager, seeds) = manager_with_validators(3);
        let outcomes = run_blocks(&mut manager, &seeds, 1, 10, 100_000);

        assert_eq!(outcomes.len(), 1);
        let outcome = &outcomes[0];
        assert!(outcome.fraud.is_none());
        assert_eq!(outcome.commitment.block_height, 10);
        assert_eq!(outcome.commitment.previous_commitment, "");
        assert_eq!(outcome.commitment.witness_addresses.len(), 3);
        assert!((outcome.leader_reward.1 - 0.4).abs() < 1e-9);
        assert_eq!(outcome.witness_rewards.len(), 3);
        assert!(outcome.witness_rewards.iter().all(|(_, r)| (*r - 0.01).abs() < 1e-9));
        assert_eq!(manager.tiers.l1.len(), 1);
        assert_eq!(manager.recovery.len(), 1);
    }

    #[test]
    fn test_second_commitment_links_to_first() {
        let (mut manager, seeds) = manager_with_validators(3);
        let outcomes = run_blocks(&mut manager, &seeds, 1, 20, 100_000);

        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            outcomes[1].commitment.previous_commitment,
            outcomes[0].commitment.hash()
        );
        assert_eq!(manager.tiers.l1[1].height_start, 11);
        assert_eq!(manager.tiers.l1[1].height_end, 20);
    }

    #[test]
    fn test_witness_shortage_drops_commitment() {
        let (mut manager, seeds) = manager_with_validators(2); // below min 3
        let outcomes = run_blocks(&mut manager, &seeds, 1, 10, 100_000);
        assert!(outcomes.is_empty());
        assert!(manager.tiers.l1.is_empty());
        // retried at the next interval
        assert_eq!(manager.last_commitment_height, 10);
    }

    #[test]
    fn test_unsigned_witnesses_drop_commitment() {
        let (mut manager, _seeds) = manager_with_validators(3);
        let refuse = |_: &str, _: &[u8]| None;
        let block = test_block(10, "0", 100_000);
        manager.current_height = 9;
        manager.last_commitment_height = 0;
        let outcome = manager
            .add_block(&block, HashMap::new(), vec![], &accounts(), 100_000, &refuse)
            .unwrap();
        assert!(outcome.is_none());
        assert!(manager.tiers.l1.is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let (mut manager, seeds) = manager_with_validators(3);
        run_blocks(&mut manager, &seeds, 1, 10, 100_000);
        manager.save(dir.path()).unwrap();

        let restored = ZeroHistoryManager::load(dir.path(), ZeroHistoryConfig::dev());
        assert_eq!(restored.current_height, 10);
        assert_eq!(restored.last_commitment_height, 10);
        assert_eq!(restored.tiers.l1.len(), 1);
        assert_eq!(restored.tiers.l3.len(), 10);
        assert_eq!(restored.validators.len(), 3);
        assert_eq!(restored.recovery.len(), 1);
    }
}
