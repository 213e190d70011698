//! PoET parameters and selection algorithms
//!
//! Wait times are deterministic per round: the fractional value of
//! `SHA-256("{address}:{block_hash}:{height}")` places each miner inside
//! its level's wait window, then balance bonus (up to 5% reduction) and
//! the domination penalty (toward 1.5× past 20 recent wins) adjust it.

use std::collections::{HashMap, VecDeque};

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::coordinator::{MinerInfo, MiningProof};

/// Block reward, LAC
pub const BLOCK_REWARD: f64 = 190.0;
/// Winners per block
pub const WINNERS_PER_BLOCK: usize = 19;
/// Speed (fastest-proof) winner slots
pub const SPEED_WINNERS: usize = 12;
/// Lottery winner slots
pub const LOTTERY_WINNERS: usize = 7;
/// Reward per winning slot, LAC
pub const REWARD_PER_WINNER: f64 = BLOCK_REWARD / WINNERS_PER_BLOCK as f64;
/// Target block time, seconds
pub const TARGET_BLOCK_TIME: f64 = 10.0;
/// Blocks between difficulty adjustments
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 100;
/// Minimum balance to participate, LAC
pub const MIN_MINING_BALANCE: f64 = 50.0;
/// Speed wins allowed per address per block
pub const MAX_WINS_PER_ADDRESS: usize = 3;
/// Recent wins (last 100 blocks) before the wait penalty starts
pub const DOMINATION_THRESHOLD: u32 = 20;
/// Cap on the domination wait multiplier
pub const DOMINATION_PENALTY: f64 = 1.5;
/// Window for domination accounting, blocks
pub const WIN_WINDOW: u64 = 100;
/// Supply below which the early-adopter boost applies, LAC
pub const EARLY_ADOPTER_SUPPLY: f64 = 10_000_000.0;
/// Lottery weight multiplier during the early-adopter phase
pub const EARLY_ADOPTER_BOOST: f64 = 1.5;
/// Account age under which the newbie boost applies, seconds
pub const NEWBIE_PERIOD_SECS: u64 = 30 * 24 * 3600;
/// Lottery weight multiplier for newbie accounts
pub const NEWBIE_BOOST: f64 = 1.2;
/// Highest level
pub const MAX_LEVEL: u8 = 7;

/// Wait-time window (min, max seconds) per level
pub fn wait_range(level: u8) -> (f64, f64) {
    match level.min(MAX_LEVEL) {
        0 => (12.0, 20.0),
        1 => (10.0, 18.0),
        2 => (8.0, 16.0),
        3 => (7.0, 14.0),
        4 => (6.0, 12.0),
        5 => (5.0, 10.0),
        6 => (4.0, 8.0),
        _ => (3.0, 6.0),
    }
}

/// Balance bonus tiers (the PoS element)
pub fn balance_bonus(balance: f64) -> f64 {
    if balance >= 10_000.0 {
        0.10
    } else if balance >= 1_000.0 {
        0.05
    } else {
        0.0
    }
}

/// PoET round-independent state: difficulty, supply, win tracking
pub struct Poet {
    /// Next block height
    pub height: u64,
    /// Current difficulty
    pub difficulty: f64,
    /// Total LAC mined so far
    pub total_supply_mined: f64,
    block_times: Vec<f64>,
    recent_wins: HashMap<String, u32>,
    win_history: VecDeque<(u64, String)>,
}

impl Poet {
    /// Create PoET state for a chain at `height`
    pub fn new(height: u64, difficulty: f64, total_supply_mined: f64) -> Self {
        Self {
            height,
            difficulty,
            total_supply_mined,
            block_times: Vec::new(),
            recent_wins: HashMap::new(),
            win_history: VecDeque::new(),
        }
    }

    /// Whether the early-adopter lottery boost still applies
    pub fn is_early_adopter_phase(&self) -> bool {
        self.total_supply_mined < EARLY_ADOPTER_SUPPLY
    }

    /// Whether a balance qualifies for mining
    pub fn can_mine(&self, balance: f64) -> bool {
        balance >= MIN_MINING_BALANCE
    }

    /// Deterministic wait time for a miner this round
    pub fn wait_time(&self, level: u8, balance: f64, address: &str, block_hash: &str) -> f64 {
        let (min_wait, max_wait) = wait_range(level);

        let digest = Sha256::digest(format!("{address}:{block_hash}:{}", self.height).as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        let random_value = u64::from_be_bytes(raw) as f64 / (u64::MAX as f64 + 1.0);

        let mut wait = min_wait + (max_wait - min_wait) * random_value;

        // Balance bonus trims up to 5%
        wait *= 1.0 - balance_bonus(balance) * 0.5;

        // Domination penalty scales toward 1.5x past the threshold
        let wins = self.recent_wins.get(address).copied().unwrap_or(0);
        if wins > DOMINATION_THRESHOLD {
            let penalty = 1.0 + (wins - DOMINATION_THRESHOLD) as f64 * 0.1;
            wait *= penalty.min(DOMINATION_PENALTY);
        }

        wait
    }

    /// Lottery ticket weight for a miner
    pub fn lottery_weight(
        &self,
        level: u8,
        balance: f64,
        account_created_at: Option<u64>,
        now: u64,
    ) -> f64 {
        let mut weight = 1.0 + level.min(MAX_LEVEL) as f64 * 0.05;
        weight *= 1.0 + balance_bonus(balance) * 0.5;
        if let Some(created_at) = account_created_at {
            if now.saturating_sub(created_at) < NEWBIE_PERIOD_SECS {
                weight *= NEWBIE_BOOST;
            }
        }
        if self.is_early_adopter_phase() {
            weight *= EARLY_ADOPTER_BOOST;
        }
        weight
    }

    /// Speed winners: fastest proofs first, at most 3 per address,
    /// filled to 12. Ties keep proof insertion order (stable sort).
    pub fn select_speed_winners(&self, proofs: &[MiningProof]) -> Vec<MiningProof> {
        let mut sorted: Vec<MiningProof> = proofs.to_vec();
        sorted.sort_by(|a, b| {
            a.elapsed
                .partial_cmp(&b.elapsed)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut winners = Vec::with_capacity(SPEED_WINNERS);
        let mut wins_per_address: HashMap<&str, usize> = HashMap::new();
        for proof in &sorted {
            if winners.len() >= SPEED_WINNERS {
                break;
            }
            let wins = wins_per_address.entry(proof.address.as_str()).or_insert(0);
            if *wins < MAX_WINS_PER_ADDRESS {
                winners.push(proof.clone());
                *wins += 1;
            }
        }
        winners
    }

    /// Lottery winners: weighted random with replacement, `count` draws
    /// from every registered miner.
    pub fn select_lottery_winners(
        &self,
        miners: &[MinerInfo],
        count: usize,
        now: u64,
        rng: &mut impl Rng,
    ) -> Vec<MinerInfo> {
        if miners.is_empty() || count == 0 {
            return Vec::new();
        }
        let weights: Vec<f64> = miners
            .iter()
            .map(|m| {
                self.lottery_weight(m.level, m.balance, Some(m.account_created_at), now)
                    .max(f64::MIN_POSITIVE)
            })
            .collect();
        let Ok(dist) = WeightedIndex::new(&weights) else {
            return Vec::new();
        };
        (0..count).map(|_| miners[dist.sample(rng)].clone()).collect()
    }

    /// Per-address rewards for a winner slot list
    pub fn rewards(winners: &[String]) -> HashMap<String, f64> {
        let mut rewards: HashMap<String, f64> = HashMap::new();
        for address in winners {
            *rewards.entry(address.clone()).or_insert(0.0) += REWARD_PER_WINNER;
        }
        rewards
    }

    /// Record this block's winners into the 100-block sliding window
    pub fn update_win_history(&mut self, winners: &[String]) {
        for address in winners {
            self.win_history.push_back((self.height, address.clone()));
        }
        let cutoff = self.height.saturating_sub(WIN_WINDOW);
        while matches!(self.win_history.front(), Some((block, _)) if *block <= cutoff && self.height > WIN_WINDOW)
        {
            self.win_history.pop_front();
        }
        self.recent_wins.clear();
        for (_, address) in &self.win_history {
            *self.recent_wins.entry(address.clone()).or_insert(0) += 1;
        }
    }

    /// Recent wins for an address inside the window
    pub fn recent_wins(&self, address: &str) -> u32 {
        self.recent_wins.get(address).copied().unwrap_or(0)
    }

    /// Track an observed block time
    pub fn record_block_time(&mut self, seconds: f64) {
        self.block_times.push(seconds);
        if self.block_times.len() > DIFFICULTY_ADJUSTMENT_INTERVAL as usize {
            let excess = self.block_times.len() - DIFFICULTY_ADJUSTMENT_INTERVAL as usize;
            self.block_times.drain(..excess);
        }
    }

    /// On adjustment heights, retarget toward the 10 s block time.
    /// Adjustment per interval is clamped to ±25%, difficulty to
    /// [0.1, 100]. Returns whether an adjustment happened.
    pub fn maybe_adjust_difficulty(&mut self) -> bool {
        if self.height == 0 || self.height % DIFFICULTY_ADJUSTMENT_INTERVAL != 0 {
            return false;
        }
        if self.block_times.is_empty() {
            return false;
        }
        let avg = self.block_times.iter().sum::<f64>() / self.block_times.len() as f64;
        let ratio = (avg / TARGET_BLOCK_TIME).clamp(0.75, 1.25);
        self.difficulty = (self.difficulty / ratio).clamp(0.1, 100.0);
        true
    }
}
