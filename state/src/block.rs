//! Blocks
//!
//! The canonical block hash is SHA-256 over the JSON object
//! `{index, prev, ts, txs, nonce}` with sorted keys and no whitespace,
//! where `txs` is the transaction count. PoET has no PoW nonce; the
//! field is retained at zero for wire compatibility.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::messages::EphemeralMessage;
use crate::transaction::Transaction;

/// Reward paid to one winner in a block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewardRecord {
    /// Winning address
    pub address: String,
    /// Reward in LAC
    pub reward: f64,
}

/// A block of the chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Height
    pub index: u64,
    /// Unix timestamp
    pub timestamp: u64,
    /// Hash of the previous block
    pub previous_hash: String,
    /// Included transactions
    pub transactions: Vec<Transaction>,
    /// Included ephemeral messages
    #[serde(default)]
    pub ephemeral_msgs: Vec<EphemeralMessage>,
    /// Retained for compatibility, always 0
    pub nonce: u64,
    /// Producer tag
    pub miner: String,
    /// Difficulty at production time
    pub difficulty: f64,
    /// Canonical hash
    pub hash: String,
    /// Unique winner count for this block
    #[serde(default)]
    pub mining_winners_count: usize,
    /// Total reward paid out
    #[serde(default)]
    pub total_reward: f64,
    /// Per-winner reward records
    #[serde(default)]
    pub mining_rewards: Vec<RewardRecord>,
}

/// Canonical block hash
pub fn compute_block_hash(
    index: u64,
    previous_hash: &str,
    timestamp: u64,
    tx_count: usize,
    nonce: u64,
) -> String {
    let value = json!({
        "index": index,
        "prev": previous_hash,
        "ts": timestamp,
        "txs": tx_count,
        "nonce": nonce,
    });
    let bytes = serde_json::to_vec(&value).unwrap_or_default();
    hex::encode(Sha256::digest(bytes))
}

impl Block {
    /// The genesis block
    pub fn genesis(timestamp: u64) -> Self {
        Self {
            index: 0,
            timestamp,
            previous_hash: "0".to_string(),
            transactions: Vec::new(),
            ephemeral_msgs: Vec::new(),
            nonce: 0,
            miner: "genesis".to_string(),
            difficulty: 1.0,
            hash: "0".repeat(64),
            mining_winners_count: 0,
            total_reward: 0.0,
            mining_rewards: Vec::new(),
        }
    }

    /// Whether this block's recorded hash matches the canonical encoding
    pub fn verify_hash(&self) -> bool {
        if self.index == 0 {
            return true;
        }
        self.hash
            == compute_block_hash(
                self.index,
                &self.previous_hash,
                self.timestamp,
                self.transactions.len(),
                self.nonce,
            )
    }

    /// Whether this block links to `previous`
    pub fn links_to(&self, previous: &Block) -> bool {
        self.index == previous.index + 1 && self.previous_hash == previous.hash
    }

    /// Sum of public transaction volume
    pub fn total_volume(&self) -> f64 {
        self.transactions.iter().map(|tx| tx.amount()).sum()
    }
}
