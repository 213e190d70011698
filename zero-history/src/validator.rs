//! Validator registry
//!
//! L5/L6 wallets with sufficient stake can validate. Leaders are picked
//! weighted by `level × reputation`; fraud bans a validator for the
//! configured number of days (and can slash when enabled).

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ZeroHistoryConfig;
use crate::errors::{ZeroHistoryError, ZeroHistoryResult};

/// A registered validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub address: String,
    /// 5 or 6
    pub level: u8,
    /// LAC staked
    pub stake: f64,
    /// 0.0..=1.0
    pub reputation: f64,
    pub commitments_created: u32,
    pub fraud_reports: u32,
    pub last_active: u64,
    /// Ban expiry; 0 when never banned
    #[serde(default)]
    pub banned_until: u64,
    #[serde(default)]
    pub total_rewards: f64,
    /// Ed25519 public key used to verify witness signatures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
}

impl ValidatorInfo {
    /// Active means not currently banned
    pub fn is_active(&self, now: u64) -> bool {
        now > self.banned_until
    }

    /// Leader-selection weight
    pub fn selection_weight(&self) -> f64 {
        self.level as f64 * self.reputation
    }
}

/// Registry of validators and their economics
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ValidatorRegistry {
    validators: HashMap<String, ValidatorInfo>,
}

impl ValidatorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator, enforcing the level and stake gates.
    pub fn register(
        &mut self,
        config: &ZeroHistoryConfig,
        address: &str,
        level: u8,
        stake: f64,
        pubkey: Option<String>,
        now: u64,
    ) -> ZeroHistoryResult<()> {
        if level < config.min_validator_level || level > 6 {
            return Err(ZeroHistoryError::ValidatorIneligible {
                level,
                stake,
                required: config.required_stake(level.clamp(5, 6)),
            });
        }
        let required = config.required_stake(level);
        if stake < required {
            return Err(ZeroHistoryError::ValidatorIneligible {
                level,
                stake,
                required,
            });
        }

        let entry = self
            .validators
            .entry(address.to_string())
            .or_insert_with(|| ValidatorInfo {
                address: address.to_string(),
                level,
                stake,
                reputation: 1.0,
                commitments_created: 0,
                fraud_reports: 0,
                last_active: now,
                banned_until: 0,
                total_rewards: 0.0,
                pubkey: None,
            });
        entry.level = level;
        entry.stake = stake;
        entry.last_active = now;
        if pubkey.is_some() {
            entry.pubkey = pubkey;
        }
        info!("validator registered: {address} (L{level}, {stake} LAC)");
        Ok(())
    }

    /// All validators not currently banned
    pub fn active(&self, now: u64) -> Vec<&ValidatorInfo> {
        let mut list: Vec<&ValidatorInfo> = self
            .validators
            .values()
            .filter(|v| v.is_active(now))
            .collect();
        list.sort_by(|a, b| a.address.cmp(&b.address));
        list
    }

    /// Fetch one validator
    pub fn get(&self, address: &str) -> Option<&ValidatorInfo> {
        self.validators.get(address)
    }

    /// Pick a commitment leader weighted by `level × reputation`
    pub fn select_leader(&self, now: u64, rng: &mut impl Rng) -> Option<ValidatorInfo> {
        let active = self.active(now);
        if active.is_empty() {
            return None;
        }
        let total: f64 = active.iter().map(|v| v.selection_weight()).sum();
        if total <= 0.0 {
            return active.first().map(|v| (*v).clone());
        }
        let mut target = rng.gen_range(0.0..total);
        for validator in &active {
            target -= validator.selection_weight();
            if target <= 0.0 {
                return Some((*validator).clone());
            }
        }
        active.last().map(|v| (*v).clone())
    }

    /// Credit the leader's commitment reward; returns the amount
    pub fn reward_leader(&mut self, config: &ZeroHistoryConfig, address: &str, now: u64) -> f64 {
        let Some(validator) = self.validators.get_mut(address) else {
            return 0.0;
        };
        let reward = config.commitment_reward(validator.level);
        validator.total_rewards += reward;
        validator.commitments_created += 1;
        validator.last_active = now;
        reward
    }

    /// Credit each witness; returns `(address, reward)` pairs
    pub fn reward_witnesses(
        &mut self,
        config: &ZeroHistoryConfig,
        addresses: &[String],
        now: u64,
    ) -> Vec<(String, f64)> {
        let mut paid = Vec::with_capacity(addresses.len());
        for address in addresses {
            if let Some(validator) = self.validators.get_mut(address) {
                validator.total_rewards += config.witness_reward;
                validator.last_active = now;
                paid.push((address.clone(), config.witness_reward));
            }
        }
        paid
    }

    /// Punish a fraudulent validator: ban (and slash when enabled)
    pub fn punish_fraud(&mut self, config: &ZeroHistoryConfig, address: &str, now: u64) {
        let Some(validator) = self.validators.get_mut(address) else {
            return;
        };
        if config.fraud_slash_fraction > 0.0 {
            let slashed = validator.stake * config.fraud_slash_fraction;
            validator.stake -= slashed;
            warn!("slashed {slashed} LAC from {address}");
        }
        validator.banned_until = now + config.fraud_ban_days * 24 * 3600;
        validator.fraud_reports += 1;
        warn!(
            "fraud punishment: {address} banned for {} days ({} reports)",
            config.fraud_ban_days, validator.fraud_reports
        );
    }

    /// Credit a fraud reporter's registry reward tally
    pub fn reward_reporter(&mut self, config: &ZeroHistoryConfig, address: &str) {
        if let Some(validator) = self.validators.get_mut(address) {
            validator.total_rewards += config.fraud_reward;
        }
    }

    /// Total registered validators
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(n: usize) -> (ZeroHistoryConfig, ValidatorRegistry) {
        let config = ZeroHistoryConfig::dev();
        let mut registry = ValidatorRegistry::new();
        for i in 0..n {
            registry
                .register(&config, &format!("lac1val{i}"), 5, 1_000.0, None, 1_000)
                .unwrap();
        }
        (config, registry)
    }

    #[test]
    fn test_register_gates() {
        let config = ZeroHistoryConfig::dev();
        let mut registry = ValidatorRegistry::new();

        // level too low
        assert!(registry
            .register(&config, "lac1a", 4, 10_000.0, None, 0)
            .is_err());
        // stake too low for L5
        assert!(registry.register(&config, "lac1a", 5, 999.0, None, 0).is_err());
        // stake too low for L6
        assert!(registry
            .register(&config, "lac1a", 6, 4_000.0, None, 0)
            .is_err());
        // valid
        registry.register(&config, "lac1a", 5, 1_000.0, None, 0).unwrap();
        registry.register(&config, "lac1b", 6, 5_000.0, None, 0).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ban_excludes_from_active() {
        let (config, mut registry) = registry_with(2);
        registry.punish_fraud(&config, "lac1val0", 2_000);

        let active = registry.active(2_001);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].address, "lac1val1");

        // ban expires
        let after_ban = 2_000 + config.fraud_ban_days * 24 * 3600 + 1;
        assert_eq!(registry.active(after_ban).len(), 2);
    }

    #[test]
    fn test_leader_selection_only_active() {
        let (config, mut registry) = registry_with(3);
        registry.punish_fraud(&config, "lac1val1", 2_000);

        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let leader = registry.select_leader(2_001, &mut rng).unwrap();
            assert_ne!(leader.address, "lac1val1");
        }
    }

    #[test]
    fn test_rewards_tally() {
        let (config, mut registry) = registry_with(3);
        let leader_reward = registry.reward_leader(&config, "lac1val0", 2_000);
        assert_eq!(leader_reward, 0.4);

        let paid = registry.reward_witnesses(
            &config,
            &["lac1val1".to_string(), "lac1val2".to_string()],
            2_000,
        );
        assert_eq!(paid.len(), 2);
        assert!(paid.iter().all(|(_, r)| *r == 0.01));

        let v0 = registry.get("lac1val0").unwrap();
        assert_eq!(v0.commitments_created, 1);
        assert!((v0.total_rewards - 0.4).abs() < 1e-9);
    }
}
