//! Storage tiers
//!
//! L3 keeps everything, L2 keeps proofs-of-what-was, L1 keeps only
//! commitments. A block may leave L2 only when an L1 commitment covers
//! its height; otherwise it stays and the gap is logged.

use std::collections::{BTreeMap, HashMap};

use lac_state::{Block, EphemeralMessage, RewardRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::commitment::{merkle_root_of, StateCommitment};
use crate::config::ZeroHistoryConfig;

/// Full block data, first ~30 days
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L3Block {
    pub height: u64,
    pub transactions: Vec<lac_state::Transaction>,
    pub ephemeral_msgs: Vec<EphemeralMessage>,
    pub mining_rewards: Vec<RewardRecord>,
    pub timestamp: u64,
    pub hash: String,
    pub previous_hash: String,
    /// Balance changes this block caused
    pub utxo_delta: HashMap<String, f64>,
    /// Key images spent in this block
    pub spent_key_images: Vec<String>,
}

impl L3Block {
    /// Capture a chain block with its side data
    pub fn from_block(
        block: &Block,
        utxo_delta: HashMap<String, f64>,
        spent_key_images: Vec<String>,
    ) -> Self {
        Self {
            height: block.index,
            transactions: block.transactions.clone(),
            ephemeral_msgs: block.ephemeral_msgs.clone(),
            mining_rewards: block.mining_rewards.clone(),
            timestamp: block.timestamp,
            hash: block.hash.clone(),
            previous_hash: block.previous_hash.clone(),
            utxo_delta,
            spent_key_images,
        }
    }
}

/// Pruned block data, ~30 to ~90 days
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L2Block {
    pub height: u64,
    /// Merkle root over the block's transaction hashes
    pub merkle_root: String,
    /// Hash of the full L3 payload at pruning time
    pub state_hash: String,
    pub timestamp: u64,
    pub hash: String,
    pub transaction_count: usize,
    pub total_volume: f64,
    /// Fraud proof ids referencing this height
    #[serde(default)]
    pub fraud_proofs: Vec<String>,
}

impl L2Block {
    /// Prune an L3 block down to its verifiable skeleton
    pub fn from_l3(block: &L3Block) -> Self {
        let tx_hashes: Vec<String> = block.transactions.iter().map(|tx| tx.hash()).collect();
        let payload = serde_json::to_vec(block).unwrap_or_default();
        Self {
            height: block.height,
            merkle_root: merkle_root_of(&tx_hashes),
            state_hash: hex::encode(Sha256::digest(&payload)),
            timestamp: block.timestamp,
            hash: block.hash.clone(),
            transaction_count: block.transactions.len(),
            total_volume: block.transactions.iter().map(|tx| tx.amount()).sum(),
            fraud_proofs: Vec::new(),
        }
    }
}

/// Permanent record: a commitment over a height range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L1Entry {
    pub height_start: u64,
    pub height_end: u64,
    pub commitment: StateCommitment,
    /// Checkpoints survive retention cleanup forever
    #[serde(default)]
    pub checkpoint: bool,
}

impl L1Entry {
    /// Whether this entry's range covers a height
    pub fn covers(&self, height: u64) -> bool {
        (self.height_start..=self.height_end).contains(&height)
    }
}

/// Outcome of one pruning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneStats {
    /// Blocks moved L3 → L2
    pub l3_pruned: usize,
    /// Blocks deleted from L2 (covered by a commitment)
    pub l2_deleted: usize,
    /// Blocks past the L2 lifetime kept for lack of coverage
    pub l2_kept_uncovered: usize,
}

/// The three tiers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierStore {
    pub l3: BTreeMap<u64, L3Block>,
    pub l2: BTreeMap<u64, L2Block>,
    pub l1: Vec<L1Entry>,
}

impl TierStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh block into L3
    pub fn insert_l3(&mut self, block: L3Block) {
        self.l3.insert(block.height, block);
    }

    /// L3 blocks inside an inclusive height range, ascending
    pub fn l3_range(&self, start: u64, end: u64) -> Vec<&L3Block> {
        self.l3.range(start..=end).map(|(_, b)| b).collect()
    }

    /// Whether any L1 commitment covers a height
    pub fn has_covering_commitment(&self, height: u64) -> bool {
        self.l1.iter().any(|entry| entry.covers(height))
    }

    /// Append a finalized commitment
    pub fn push_commitment(&mut self, entry: L1Entry) {
        self.l1.push(entry);
    }

    /// Hash of the newest commitment, empty string when none exists
    pub fn latest_commitment_hash(&self) -> String {
        self.l1
            .last()
            .map(|e| e.commitment.hash())
            .unwrap_or_default()
    }

    /// Age-based pruning: L3 → L2 past the L3 lifetime, L2 → gone past
    /// the L2 lifetime when a covering commitment exists.
    pub fn prune(&mut self, config: &ZeroHistoryConfig, now: u64) -> PruneStats {
        let mut stats = PruneStats::default();

        let l3_cutoff = now.saturating_sub(config.l3_lifetime_secs);
        let expired_l3: Vec<u64> = self
            .l3
            .iter()
            .filter(|(_, b)| b.timestamp < l3_cutoff)
            .map(|(h, _)| *h)
            .collect();
        for height in expired_l3 {
            if let Some(block) = self.l3.remove(&height) {
                debug!("pruning block #{height} L3 -> L2");
                self.l2.insert(height, L2Block::from_l3(&block));
                stats.l3_pruned += 1;
            }
        }

        let l2_cutoff = now.saturating_sub(config.l2_lifetime_secs);
        let expired_l2: Vec<u64> = self
            .l2
            .iter()
            .filter(|(_, b)| b.timestamp < l2_cutoff)
            .map(|(h, _)| *h)
            .collect();
        for height in expired_l2 {
            if self.has_covering_commitment(height) {
                self.l2.remove(&height);
                stats.l2_deleted += 1;
            } else {
                stats.l2_kept_uncovered += 1;
                warn!("block #{height} past L2 lifetime but no covering commitment, keeping");
            }
        }

        stats
    }
}
