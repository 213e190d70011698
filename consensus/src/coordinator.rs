//! Mining round coordinator
//!
//! Holds the per-round miner registry and submitted proofs, and turns a
//! round into winners + rewards. The block production loop owns exactly
//! one coordinator; rounds reset after every block.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ConsensusError, ConsensusResult};
use crate::poet::{self, Poet};

/// A miner registered for the current round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerInfo {
    pub address: String,
    pub level: u8,
    pub balance: f64,
    pub account_created_at: u64,
    /// Assigned wait time for this round, seconds
    pub wait_time: f64,
    /// Registration timestamp
    pub registered_at: u64,
}

/// A submitted proof of elapsed time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningProof {
    pub address: String,
    pub level: u8,
    pub balance: f64,
    pub wait_time: f64,
    /// Seconds actually waited
    pub elapsed: f64,
    pub timestamp: u64,
}

/// Registration response for a miner
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    /// Assigned wait time, seconds
    pub wait_time: f64,
    /// Current lottery ticket weight
    pub lottery_weight: f64,
}

/// The finished round
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    /// Height of the block this round produced
    pub height: u64,
    pub timestamp: u64,
    /// Winner addresses in slot order (speed slots first)
    pub winners: Vec<String>,
    /// Accumulated reward per address
    pub rewards: HashMap<String, f64>,
    pub speed_count: usize,
    pub lottery_count: usize,
    pub unique_winners: usize,
    pub total_reward: f64,
    pub proofs_submitted: usize,
    pub active_miners: usize,
    pub difficulty: f64,
    pub difficulty_adjusted: bool,
}

/// Coordinates one mining round at a time
pub struct MiningCoordinator {
    /// Long-lived PoET state
    pub poet: Poet,
    active_miners: Vec<MinerInfo>,
    submitted_proofs: Vec<MiningProof>,
    last_block_time: Option<u64>,
}

impl MiningCoordinator {
    /// Create a coordinator over existing PoET state
    pub fn new(poet: Poet) -> Self {
        Self {
            poet,
            active_miners: Vec::new(),
            submitted_proofs: Vec::new(),
            last_block_time: None,
        }
    }

    /// Register a miner for the current round. The wait time is
    /// deterministic given `(address, block_hash, height)`.
    pub fn register_miner(
        &mut self,
        address: &str,
        level: u8,
        balance: f64,
        account_created_at: u64,
        block_hash: &str,
        now: u64,
    ) -> ConsensusResult<RegisterOutcome> {
        if !self.poet.can_mine(balance) {
            return Err(ConsensusError::BelowMinimumBalance {
                required: poet::MIN_MINING_BALANCE,
                have: balance,
            });
        }

        let wait_time = self.poet.wait_time(level, balance, address, block_hash);
        let lottery_weight = self
            .poet
            .lottery_weight(level, balance, Some(account_created_at), now);

        self.active_miners.retain(|m| m.address != address);
        self.active_miners.push(MinerInfo {
            address: address.to_string(),
            level,
            balance,
            account_created_at,
            wait_time,
            registered_at: now,
        });

        Ok(RegisterOutcome {
            wait_time,
            lottery_weight,
        })
    }

    /// Submit a proof after waiting. Proofs shorter than the assigned
    /// wait are not speed candidates and are dropped.
    pub fn submit_proof(&mut self, address: &str, elapsed: f64, now: u64) -> ConsensusResult<Option<MiningProof>> {
        let miner = self
            .active_miners
            .iter()
            .find(|m| m.address == address)
            .ok_or_else(|| ConsensusError::UnknownMiner(address.to_string()))?;

        if elapsed < miner.wait_time {
            return Ok(None);
        }

        let proof = MiningProof {
            address: miner.address.clone(),
            level: miner.level,
            balance: miner.balance,
            wait_time: miner.wait_time,
            elapsed,
            timestamp: now,
        };
        self.submitted_proofs.push(proof.clone());
        Ok(Some(proof))
    }

    /// Number of miners registered this round
    pub fn active_miner_count(&self) -> usize {
        self.active_miners.len()
    }

    /// Finish the round: pick 12 speed + lottery fill to 19, compute
    /// rewards, update win history and difficulty, reset for the next
    /// round.
    pub fn mine_round(&mut self, now: u64) -> RoundOutcome {
        let speed_winners = self.poet.select_speed_winners(&self.submitted_proofs);
        let lottery_needed = poet::WINNERS_PER_BLOCK.saturating_sub(speed_winners.len());

        let mut rng = rand::thread_rng();
        let lottery_winners =
            self.poet
                .select_lottery_winners(&self.active_miners, lottery_needed, now, &mut rng);

        let winners: Vec<String> = speed_winners
            .iter()
            .map(|w| w.address.clone())
            .chain(lottery_winners.iter().map(|w| w.address.clone()))
            .collect();

        let rewards = Poet::rewards(&winners);
        let total_reward: f64 = rewards.values().sum();
        let unique_winners = rewards.len();

        self.poet.update_win_history(&winners);

        if let Some(last) = self.last_block_time {
            self.poet.record_block_time(now.saturating_sub(last) as f64);
        }
        self.last_block_time = Some(now);

        let difficulty_adjusted = self.poet.maybe_adjust_difficulty();
        self.poet.total_supply_mined += poet::BLOCK_REWARD;

        let outcome = RoundOutcome {
            height: self.poet.height,
            timestamp: now,
            winners,
            rewards,
            speed_count: speed_winners.len(),
            lottery_count: lottery_winners.len(),
            unique_winners,
            total_reward,
            proofs_submitted: self.submitted_proofs.len(),
            active_miners: self.active_miners.len(),
            difficulty: self.poet.difficulty,
            difficulty_adjusted,
        };

        debug!(
            "round at height {}: {} speed + {} lottery, {} unique, {:.1} LAC",
            outcome.height,
            outcome.speed_count,
            outcome.lottery_count,
            outcome.unique_winners,
            outcome.total_reward
        );

        self.poet.height += 1;
        self.active_miners.clear();
        self.submitted_proofs.clear();

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> MiningCoordinator {
        MiningCoordinator::new(Poet::new(0, 1.0, 0.0))
    }

    #[test]
    fn test_register_rejects_low_balance() {
        let mut coord = coordinator();
        let err = coord
            .register_miner("poor", 0, 10.0, 0, "h", 1_000)
            .unwrap_err();
        assert!(matches!(err, ConsensusError::BelowMinimumBalance { .. }));
        assert_eq!(coord.active_miner_count(), 0);
    }

    #[test]
    fn test_proof_must_respect_wait() {
        let mut coord = coordinator();
        let outcome = coord.register_miner("m1", 5, 1_000.0, 0, "h", 1_000).unwrap();

        let early = coord.submit_proof("m1", outcome.wait_time - 1.0, 1_001).unwrap();
        assert!(early.is_none());

        let on_time = coord.submit_proof("m1", outcome.wait_time, 1_010).unwrap();
        assert!(on_time.is_some());
    }

    #[test]
    fn test_unregistered_proof_rejected() {
        let mut coord = coordinator();
        assert!(matches!(
            coord.submit_proof("ghost", 10.0, 1_000),
            Err(ConsensusError::UnknownMiner(_))
        ));
    }

    #[test]
    fn test_round_fills_to_nineteen_with_enough_miners() {
        let mut coord = coordinator();
        for i in 0..20 {
            let addr = format!("miner{i:02}");
            let reg = coord.register_miner(&addr, 3, 100.0, 0, "h", 1_000).unwrap();
            coord.submit_proof(&addr, reg.wait_time, 1_010).unwrap();
        }

        let outcome = coord.mine_round(1_020);
        assert_eq!(outcome.speed_count, poet::SPEED_WINNERS);
        assert_eq!(
            outcome.speed_count + outcome.lottery_count,
            poet::WINNERS_PER_BLOCK
        );
        assert!((outcome.total_reward - poet::BLOCK_REWARD).abs() < 1e-9);
        // round state reset
        assert_eq!(coord.active_miner_count(), 0);
        assert_eq!(coord.poet.height, 1);
    }

    #[test]
    fn test_lottery_fills_when_few_proofs() {
        let mut coord = coordinator();
        for i in 0..3 {
            let addr = format!("m{i}");
            let reg = coord.register_miner(&addr, 3, 100.0, 0, "h", 1_000).unwrap();
            coord.submit_proof(&addr, reg.wait_time, 1_010).unwrap();
        }

        let outcome = coord.mine_round(1_020);
        assert_eq!(outcome.speed_count, 3);
        assert_eq!(outcome.lottery_count, poet::WINNERS_PER_BLOCK - 3);
        // with replacement, all 19 slots still paid
        assert!((outcome.total_reward - poet::BLOCK_REWARD).abs() < 1e-9);
    }

    #[test]
    fn test_speed_winner_determinism_with_fixed_elapsed() {
        // two coordinators with identical miner sets and elapsed values
        // produce identical speed winner lists
        let run = || {
            let mut coord = coordinator();
            for (addr, level, balance) in [
                ("alpha", 5u8, 1_000.0),
                ("beta", 6u8, 5_000.0),
                ("gamma", 5u8, 1_000.0),
            ] {
                let reg = coord
                    .register_miner(addr, level, balance, 0, "fixedhash", 1_000)
                    .unwrap();
                coord.submit_proof(addr, reg.wait_time, 1_010).unwrap();
            }
            let outcome = coord.mine_round(1_020);
            outcome.winners[..outcome.speed_count].to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_reregistration_replaces_entry() {
        let mut coord = coordinator();
        coord.register_miner("m1", 3, 100.0, 0, "h", 1_000).unwrap();
        coord.register_miner("m1", 3, 200.0, 0, "h", 1_001).unwrap();
        assert_eq!(coord.active_miner_count(), 1);
    }
}
