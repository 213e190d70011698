//! STASH pool state
//!
//! The shielded pool holds fixed-nominal deposits keyed by the hash of
//! their nullifier. Spending publishes the nullifier itself; the spent
//! set is append-only and a withdrawal consumes the matching deposit
//! entry in the same mutation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::{StateError, StateResult};

/// One shielded deposit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StashDeposit {
    /// Nominal amount, LAC
    pub amount: f64,
    /// Nominal code 0..=3
    pub nominal: u8,
    /// Deposit timestamp
    pub timestamp: u64,
}

/// The shielded pool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StashPool {
    /// Total LAC locked in the pool
    pub total_balance: f64,
    /// nullifier_hash → deposit
    #[serde(default)]
    pub deposits: HashMap<String, StashDeposit>,
    /// Spent nullifiers, append-only
    #[serde(default)]
    pub spent_nullifiers: Vec<String>,
}

impl StashPool {
    /// Record a deposit
    pub fn deposit(&mut self, nullifier_hash: String, amount: f64, nominal: u8, timestamp: u64) {
        self.total_balance += amount;
        self.deposits.insert(
            nullifier_hash,
            StashDeposit {
                amount,
                nominal,
                timestamp,
            },
        );
    }

    /// Whether a nullifier was already spent
    pub fn is_spent(&self, nullifier: &str) -> bool {
        self.spent_nullifiers.iter().any(|n| n == nullifier)
    }

    /// Apply a withdrawal atomically: checks the nullifier and the pool
    /// balance, appends to the spent set, decrements the pool, and
    /// consumes the matching deposit entry.
    pub fn withdraw(
        &mut self,
        nullifier: &str,
        nullifier_hash: &str,
        amount: f64,
    ) -> StateResult<()> {
        if self.is_spent(nullifier) {
            return Err(StateError::DuplicateNullifier);
        }
        if self.total_balance < amount {
            return Err(StateError::StashInsufficientPool {
                need: amount,
                have: self.total_balance,
            });
        }
        self.total_balance -= amount;
        self.spent_nullifiers.push(nullifier.to_string());
        self.deposits.remove(nullifier_hash);
        Ok(())
    }
}
