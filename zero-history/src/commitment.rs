//! State commitments
//!
//! A commitment is the compact, witnessed summary of ledger state at a
//! height: a merkle root over the block range, a UTXO root over the
//! account set, the total supply, and the validator + witness set that
//! vouched for it. Commitments chain through `previous_commitment`; the
//! very first link is the empty string.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Account set snapshot: address → balance, ordered for stable roots
pub type AccountSnapshot = BTreeMap<String, f64>;

/// An L1 state commitment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateCommitment {
    /// Height this commitment covers up to
    pub block_height: u64,
    /// Hash of state at this height
    pub commitment_hash: String,
    /// Merkle root over the committed block range
    pub merkle_root: String,
    /// Merkle root over the account set
    pub utxo_root: String,
    /// Total LAC supply at this height
    pub total_supply: f64,
    /// Validator that created the commitment
    pub validator_address: String,
    /// That validator's level (5 or 6)
    pub validator_level: u8,
    /// Creation timestamp
    pub timestamp: u64,
    /// Witness signatures (Ed25519 over the commitment hash)
    pub witness_signatures: Vec<String>,
    /// Witness addresses, same order as the signatures
    pub witness_addresses: Vec<String>,
    /// Hash of the previous commitment, empty for the first
    pub previous_commitment: String,
}

impl StateCommitment {
    /// Identity hash of this commitment
    pub fn hash(&self) -> String {
        let data = format!(
            "{}{}{}{}{}",
            self.block_height,
            self.commitment_hash,
            self.merkle_root,
            self.utxo_root,
            self.validator_address
        );
        hex::encode(Sha256::digest(data.as_bytes()))
    }
}

/// Pairwise merkle root over hex-string hashes. Odd nodes pair with
/// themselves; an empty list hashes the literal `empty`.
pub fn merkle_root_of(hashes: &[String]) -> String {
    if hashes.is_empty() {
        return hex::encode(Sha256::digest(b"empty"));
    }
    let mut level: Vec<String> = hashes.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(hex::encode(Sha256::digest(
                format!("{left}{right}").as_bytes(),
            )));
        }
        level = next;
    }
    level.remove(0)
}

/// Merkle root over the account set. Leaves are `H("{address}:{balance}")`
/// in address order; an empty set hashes the literal `empty_utxo`.
pub fn utxo_root(accounts: &AccountSnapshot) -> String {
    if accounts.is_empty() {
        return hex::encode(Sha256::digest(b"empty_utxo"));
    }
    let leaves: Vec<String> = accounts
        .iter()
        .map(|(address, balance)| {
            hex::encode(Sha256::digest(format!("{address}:{balance}").as_bytes()))
        })
        .collect();
    merkle_root_of(&leaves)
}

/// Total supply of an account snapshot
pub fn total_supply(accounts: &AccountSnapshot) -> f64 {
    accounts.values().sum()
}

/// Hash of committed state for a height
pub fn state_hash(height: u64, merkle_root: &str, utxo_root: &str, supply: f64) -> String {
    hex::encode(Sha256::digest(
        format!("state:{height}:{merkle_root}:{utxo_root}:{supply}").as_bytes(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, f64)]) -> AccountSnapshot {
        pairs.iter().map(|(a, b)| (a.to_string(), *b)).collect()
    }

    #[test]
    fn test_merkle_root_empty_and_single() {
        let empty = merkle_root_of(&[]);
        assert_eq!(empty, hex::encode(Sha256::digest(b"empty")));

        let single = merkle_root_of(&["abc".to_string()]);
        assert_eq!(single, "abc");
    }

    #[test]
    fn test_merkle_root_order_sensitive() {
        let a = merkle_root_of(&["h1".to_string(), "h2".to_string()]);
        let b = merkle_root_of(&["h2".to_string(), "h1".to_string()]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_merkle_root_odd_count() {
        let root = merkle_root_of(&["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(root.len(), 64);
    }

    #[test]
    fn test_utxo_root_stable_across_insertion_order() {
        let a = snapshot(&[("lac1x", 10.0), ("lac1y", 20.0)]);
        let b = snapshot(&[("lac1y", 20.0), ("lac1x", 10.0)]);
        assert_eq!(utxo_root(&a), utxo_root(&b));
    }

    #[test]
    fn test_utxo_root_balance_sensitive() {
        let a = snapshot(&[("lac1x", 10.0)]);
        let b = snapshot(&[("lac1x", 10.5)]);
        assert_ne!(utxo_root(&a), utxo_root(&b));
    }

    #[test]
    fn test_commitment_hash_binds_fields() {
        let base = StateCommitment {
            block_height: 10,
            commitment_hash: "ch".into(),
            merkle_root: "mr".into(),
            utxo_root: "ur".into(),
            total_supply: 1_000.0,
            validator_address: "lac1v".into(),
            validator_level: 5,
            timestamp: 1,
            witness_signatures: vec![],
            witness_addresses: vec![],
            previous_commitment: String::new(),
        };
        let mut changed = base.clone();
        changed.merkle_root = "other".into();
        assert_ne!(base.hash(), changed.hash());

        // witness set does not alter identity
        let mut witnessed = base.clone();
        witnessed.witness_signatures.push("sig".into());
        assert_eq!(base.hash(), witnessed.hash());
    }
}
