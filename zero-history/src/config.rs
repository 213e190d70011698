//! Zero-history configuration

use serde::{Deserialize, Serialize};

/// All tunables of the tier lifecycle, commitment pipeline and
/// validator economics. `dev()` is sized for a laptop; `prod()` for a
/// real network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZeroHistoryConfig {
    /// Seconds a block stays in L3 (full data)
    pub l3_lifetime_secs: u64,
    /// Seconds a block stays in L2 (pruned)
    pub l2_lifetime_secs: u64,
    /// Blocks between state commitments
    pub commitment_interval: u64,
    /// Witness signatures required to finalize a commitment
    pub min_witnesses: usize,
    /// Seconds to collect witness signatures
    pub witness_timeout_secs: u64,
    /// Minimum validator level
    pub min_validator_level: u8,
    /// Stake required at level 5, LAC
    pub validator_stake_l5: f64,
    /// Stake required at level 6, LAC
    pub validator_stake_l6: f64,
    /// Commitment reward for an L5 leader, LAC
    pub commitment_reward_l5: f64,
    /// Commitment reward for an L6 leader, LAC
    pub commitment_reward_l6: f64,
    /// Reward per witness signature, LAC
    pub witness_reward: f64,
    /// Days a fraudulent validator is banned
    pub fraud_ban_days: u64,
    /// Stake fraction slashed on fraud (0 disables)
    pub fraud_slash_fraction: f64,
    /// Reward for a verified fraud report, LAC
    pub fraud_reward: f64,
    /// Minimum peers for bootstrap
    pub bootstrap_min_peers: usize,
    /// Peer agreement fraction required for bootstrap
    pub bootstrap_consensus: f64,
    /// Keep every Nth commitment after one year
    pub checkpoint_interval_1y: u64,
    /// Keep every Nth commitment after five years
    pub checkpoint_interval_5y: u64,
    /// Run fraud checks automatically on finalized commitments
    pub auto_fraud_check: bool,
    /// Compressed fraud proof size bound, bytes
    pub fraud_proof_max_size: usize,
}

impl ZeroHistoryConfig {
    /// Development preset: short interval, 3 witnesses
    pub fn dev() -> Self {
        Self {
            commitment_interval: 10,
            min_witnesses: 3,
            ..Self::prod()
        }
    }

    /// Production preset
    pub fn prod() -> Self {
        Self {
            l3_lifetime_secs: 30 * 24 * 3600,
            l2_lifetime_secs: 90 * 24 * 3600,
            commitment_interval: 1_000,
            min_witnesses: 100,
            witness_timeout_secs: 300,
            min_validator_level: 5,
            validator_stake_l5: 1_000.0,
            validator_stake_l6: 5_000.0,
            commitment_reward_l5: 0.4,
            commitment_reward_l6: 0.5,
            witness_reward: 0.01,
            fraud_ban_days: 15,
            fraud_slash_fraction: 0.0,
            fraud_reward: 300.0,
            bootstrap_min_peers: 3,
            bootstrap_consensus: 0.67,
            checkpoint_interval_1y: 10,
            checkpoint_interval_5y: 100,
            auto_fraud_check: true,
            fraud_proof_max_size: 2_048,
        }
    }

    /// Leader reward by validator level
    pub fn commitment_reward(&self, level: u8) -> f64 {
        if level >= 6 {
            self.commitment_reward_l6
        } else {
            self.commitment_reward_l5
        }
    }

    /// Stake requirement by validator level
    pub fn required_stake(&self, level: u8) -> f64 {
        if level >= 6 {
            self.validator_stake_l6
        } else {
            self.validator_stake_l5
        }
    }
}

impl Default for ZeroHistoryConfig {
    fn default() -> Self {
        Self::prod()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let dev = ZeroHistoryConfig::dev();
        assert_eq!(dev.commitment_interval, 10);
        assert_eq!(dev.min_witnesses, 3);

        let prod = ZeroHistoryConfig::prod();
        assert_eq!(prod.commitment_interval, 1_000);
        assert_eq!(prod.min_witnesses, 100);
        assert_eq!(prod.l3_lifetime_secs, 30 * 24 * 3600);
    }

    #[test]
    fn test_rewards_by_level() {
        let config = ZeroHistoryConfig::dev();
        assert_eq!(config.commitment_reward(5), 0.4);
        assert_eq!(config.commitment_reward(6), 0.5);
        assert_eq!(config.required_stake(5), 1_000.0);
        assert_eq!(config.required_stake(6), 5_000.0);
    }
}
