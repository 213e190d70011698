//! Recovery snapshots
//!
//! A rolling log of `{block_height, commitment_hash}` pairs (last 10)
//! taken whenever a commitment finalizes. After a failure the node can
//! restore to the newest snapshot, or rebuild a minimal state view from
//! the surviving commitment chain.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::tiers::L1Entry;

/// Snapshots retained
pub const MAX_SNAPSHOTS: usize = 10;

/// One recovery point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecoverySnapshot {
    /// Snapshot id
    pub id: String,
    /// Capture timestamp
    pub timestamp: u64,
    /// Height at capture
    pub block_height: u64,
    /// Hash of the covering commitment
    pub commitment_hash: String,
}

/// Minimal state rebuilt from the commitment chain
#[derive(Debug, Clone, PartialEq)]
pub struct RebuiltState {
    pub block_height: u64,
    pub total_supply: f64,
    pub commitment_hash: String,
}

/// Rolling log of recovery snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryLog {
    snapshots: VecDeque<RecoverySnapshot>,
}

impl RecoveryLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot, dropping the oldest past the cap
    pub fn record(&mut self, block_height: u64, commitment_hash: &str, now: u64) -> String {
        let id = hex::encode(Sha256::digest(
            format!("checkpoint_{block_height}_{now}").as_bytes(),
        ))[..16]
            .to_string();
        self.snapshots.push_back(RecoverySnapshot {
            id: id.clone(),
            timestamp: now,
            block_height,
            commitment_hash: commitment_hash.to_string(),
        });
        while self.snapshots.len() > MAX_SNAPSHOTS {
            self.snapshots.pop_front();
        }
        info!("recovery checkpoint {id} at height {block_height}");
        id
    }

    /// Restore point: a specific id, or the newest when `None`
    pub fn restore_from_checkpoint(&self, id: Option<&str>) -> Option<&RecoverySnapshot> {
        match id {
            Some(wanted) => self.snapshots.iter().find(|s| s.id == wanted),
            None => self.snapshots.back(),
        }
    }

    /// Rebuild a minimal state view from the newest surviving commitment
    pub fn rebuild_state_from_commitments(entries: &[L1Entry]) -> Option<RebuiltState> {
        let latest = entries.last()?;
        Some(RebuiltState {
            block_height: latest.commitment.block_height,
            total_supply: latest.commitment.total_supply,
            commitment_hash: latest.commitment.commitment_hash.clone(),
        })
    }

    /// Stored snapshots, oldest first
    pub fn snapshots(&self) -> impl Iterator<Item = &RecoverySnapshot> {
        self.snapshots.iter()
    }

    /// Number of snapshots held
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
