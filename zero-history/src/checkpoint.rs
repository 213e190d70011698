//! Checkpoint retention
//!
//! Commitments thin out with age: everything younger than a year stays,
//! one in ten survives the first five years, one in a hundred after
//! that. Entries flagged as checkpoints (or explicitly marked heights)
//! are kept forever and anchor the commitment chain.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ZeroHistoryConfig;
use crate::tiers::L1Entry;

const YEAR_SECS: u64 = 365 * 24 * 3600;

/// Decides which L1 entries survive cleanup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointPolicy {
    marked: HashSet<u64>,
}

impl CheckpointPolicy {
    /// Empty policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a height as a permanent checkpoint
    pub fn mark(&mut self, height: u64) {
        debug!("checkpoint marked at height {height}");
        self.marked.insert(height);
    }

    /// Whether a commitment should survive cleanup at `now`
    pub fn should_keep(&self, config: &ZeroHistoryConfig, entry: &L1Entry, now: u64) -> bool {
        if entry.checkpoint || self.marked.contains(&entry.height_end) {
            return true;
        }

        let age = now.saturating_sub(entry.commitment.timestamp);
        if age < YEAR_SECS {
            return true;
        }
        if age < 5 * YEAR_SECS {
            let stride = config.commitment_interval * config.checkpoint_interval_1y;
            return stride > 0 && entry.height_end % stride == 0;
        }
        let stride = config.commitment_interval * config.checkpoint_interval_5y;
        stride > 0 && entry.height_end % stride == 0
    }

    /// Apply the retention schedule; returns `(kept, removed_count)`
    pub fn cleanup(
        &self,
        config: &ZeroHistoryConfig,
        entries: Vec<L1Entry>,
        now: u64,
    ) -> (Vec<L1Entry>, usize) {
        let before = entries.len();
        let kept: Vec<L1Entry> = entries
            .into_iter()
            .filter(|e| self.should_keep(config, e, now))
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            debug!("checkpoint cleanup removed {removed} old commitments");
        }
        (kept, removed)
    }
}
