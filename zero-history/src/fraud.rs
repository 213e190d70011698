//! Fraud detection and proofs
//!
//! Every finalized commitment is re-checked against independently
//! recomputed state: merkle root over the block range, UTXO root over
//! the real account snapshot, total supply within 0.01 LAC, and
//! double-signing at a height. A proof carries only a hash of the
//! evidence plus essential metadata and must compress under 2 KB, so it
//! outlives the blocks it indicts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::commitment::{merkle_root_of, utxo_root, AccountSnapshot, StateCommitment};
use crate::config::ZeroHistoryConfig;
use crate::errors::{ZeroHistoryError, ZeroHistoryResult};
use crate::tiers::{L1Entry, L3Block};

/// Reporter tag used for automatically detected fraud
pub const AUTO_REPORTER: &str = "auto_detect";

/// Supply tolerance before a commitment counts as fraudulent, LAC
pub const SUPPLY_TOLERANCE: f64 = 0.01;

/// What kind of fraud a proof demonstrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudType {
    InvalidMerkle,
    InvalidUtxo,
    InvalidState,
    DoubleSign,
}

/// A fraud proof
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudProof {
    pub proof_id: String,
    pub commitment_hash: String,
    pub block_height: u64,
    pub validator_address: String,
    pub proof_type: FraudType,
    /// Full evidence (kept node-side; only its hash is in the
    /// compressed form)
    pub evidence: Value,
    pub reporter_address: String,
    pub timestamp: u64,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub compressed_size: usize,
}

impl FraudProof {
    /// Compress to the permanent wire form: essential metadata plus an
    /// evidence hash. Records the resulting size.
    pub fn compress(&mut self) -> Vec<u8> {
        let evidence_bytes = serde_json::to_vec(&self.evidence).unwrap_or_default();
        let essential = json!({
            "proof_id": self.proof_id,
            "commitment_hash": self.commitment_hash,
            "block_height": self.block_height,
            "validator_address": self.validator_address,
            "proof_type": self.proof_type,
            "evidence_hash": &hex::encode(Sha256::digest(&evidence_bytes))[..32],
            "timestamp": self.timestamp,
        });
        let compressed = serde_json::to_vec(&essential).unwrap_or_default();
        self.compressed_size = compressed.len();
        compressed
    }
}

/// Detects fraud and stores the proofs
#[derive(Debug, Default)]
pub struct FraudDetector {
    proofs: HashMap<String, FraudProof>,
}

impl FraudDetector {
    /// Empty detector
    pub fn new() -> Self {
        Self::default()
    }

    fn build_proof(
        &mut self,
        config: &ZeroHistoryConfig,
        commitment: &StateCommitment,
        proof_type: FraudType,
        evidence: Value,
        reporter: &str,
        now: u64,
    ) -> ZeroHistoryResult<FraudProof> {
        let proof_id = hex::encode(Sha256::digest(
            format!("{}{:?}{now}", commitment.hash(), proof_type).as_bytes(),
        ))[..16]
            .to_string();

        let mut proof = FraudProof {
            proof_id: proof_id.clone(),
            commitment_hash: commitment.hash(),
            block_height: commitment.block_height,
            validator_address: commitment.validator_address.clone(),
            proof_type,
            evidence,
            reporter_address: reporter.to_string(),
            timestamp: now,
            verified: false,
            compressed_size: 0,
        };
        let compressed = proof.compress();
        if compressed.len() > config.fraud_proof_max_size {
            return Err(ZeroHistoryError::FraudProofTooLarge(compressed.len()));
        }
        proof.verified = self.verify(&proof);

        warn!(
            "fraud detected: {:?} by {} at height {} (proof {proof_id}, {} bytes)",
            proof.proof_type,
            proof.validator_address,
            proof.block_height,
            proof.compressed_size
        );
        self.proofs.insert(proof_id, proof.clone());
        Ok(proof)
    }

    /// Re-check a finalized commitment against real state. Returns the
    /// first fraud found, if any.
    pub fn auto_detect(
        &mut self,
        config: &ZeroHistoryConfig,
        commitment: &StateCommitment,
        blocks: &[&L3Block],
        accounts: &AccountSnapshot,
        now: u64,
    ) -> ZeroHistoryResult<Option<FraudProof>> {
        if !config.auto_fraud_check {
            return Ok(None);
        }

        let block_hashes: Vec<String> = blocks.iter().map(|b| b.hash.clone()).collect();
        let expected_merkle = merkle_root_of(&block_hashes);
        if expected_merkle != commitment.merkle_root {
            let evidence = json!({
                "expected": expected_merkle,
                "actual": commitment.merkle_root,
                "block_range": format!(
                    "{}-{}",
                    blocks.first().map(|b| b.height).unwrap_or(0),
                    blocks.last().map(|b| b.height).unwrap_or(0)
                ),
            });
            return self
                .build_proof(config, commitment, FraudType::InvalidMerkle, evidence, AUTO_REPORTER, now)
                .map(Some);
        }

        let expected_utxo = utxo_root(accounts);
        if expected_utxo != commitment.utxo_root {
            let evidence = json!({
                "expected": expected_utxo,
                "actual": commitment.utxo_root,
                "utxo_count": accounts.len(),
            });
            return self
                .build_proof(config, commitment, FraudType::InvalidUtxo, evidence, AUTO_REPORTER, now)
                .map(Some);
        }

        let expected_supply: f64 = accounts.values().sum();
        if (expected_supply - commitment.total_supply).abs() > SUPPLY_TOLERANCE {
            let evidence = json!({
                "expected_supply": expected_supply,
                "actual_supply": commitment.total_supply,
                "difference": expected_supply - commitment.total_supply,
            });
            return self
                .build_proof(config, commitment, FraudType::InvalidState, evidence, AUTO_REPORTER, now)
                .map(Some);
        }

        Ok(None)
    }

    /// Check whether a new commitment double-signs a height an existing
    /// L1 entry already committed differently by the same validator.
    pub fn detect_double_sign(
        &mut self,
        config: &ZeroHistoryConfig,
        existing: &[L1Entry],
        candidate: &StateCommitment,
        now: u64,
    ) -> ZeroHistoryResult<Option<FraudProof>> {
        for entry in existing {
            let previous = &entry.commitment;
            if previous.validator_address == candidate.validator_address
                && previous.block_height == candidate.block_height
                && previous.hash() != candidate.hash()
            {
                let evidence = json!({
                    "signature1": previous.hash(),
                    "signature2": candidate.hash(),
                    "height": candidate.block_height,
                });
                return self
                    .build_proof(config, candidate, FraudType::DoubleSign, evidence, AUTO_REPORTER, now)
                    .map(Some);
            }
        }
        Ok(None)
    }

    /// Structural verification of a proof's evidence
    pub fn verify(&self, proof: &FraudProof) -> bool {
        if proof.proof_id.is_empty() || proof.commitment_hash.is_empty() {
            return false;
        }
        let evidence = &proof.evidence;
        match proof.proof_type {
            FraudType::InvalidMerkle | FraudType::InvalidUtxo => {
                match (evidence.get("expected"), evidence.get("actual")) {
                    (Some(e), Some(a)) => e != a,
                    _ => false,
                }
            }
            FraudType::InvalidState => {
                let (Some(expected), Some(actual)) = (
                    evidence.get("expected_supply").and_then(Value::as_f64),
                    evidence.get("actual_supply").and_then(Value::as_f64),
                ) else {
                    return false;
                };
                (expected - actual).abs() > SUPPLY_TOLERANCE
            }
            FraudType::DoubleSign => {
                evidence.get("signature1").is_some() && evidence.get("signature2").is_some()
            }
        }
    }

    /// All stored proofs
    pub fn proofs(&self) -> impl Iterator<Item = &FraudProof> {
        self.proofs.values()
    }

    /// Number of stored proofs
    pub fn len(&self) -> usize {
        self.proofs.len()
    }

    /// Whether no fraud has been recorded
    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }

    /// Export for persistence
    pub fn export(&self) -> Vec<FraudProof> {
        self.proofs.values().cloned().collect()
    }

    /// Restore from persistence
    pub fn import(&mut self, proofs: Vec<FraudProof>) {
        for proof in proofs {
            self.proofs.insert(proof.proof_id.clone(), proof);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::state_hash;
    use std::collections::HashMap;

    fn l3(height: u64, hash: &str) -> L3Block {
        L3Block {
            height,
            transactions: vec![],
            ephemeral_msgs: vec![],
            mining_rewards: vec![],
            timestamp: 0,
            hash: hash.to_string(),
            previous_hash: String::new(),
            utxo_delta: HashMap::new(),
            spent_key_images: vec![],
        }
    }

    fn honest_commitment(blocks: &[&L3Block], accounts: &AccountSnapshot) -> StateCommitment {
        let hashes: Vec<String> = blocks.iter().map(|b| b.hash.clone()).collect();
        let merkle = merkle_root_of(&hashes);
        let utxo = utxo_root(accounts);
        let supply: f64 = accounts.values().sum();
        StateCommitment {
            block_height: blocks.last().map(|b| b.height).unwrap_or(0),
            commitment_hash: state_hash(10, &merkle, &utxo, supply),
            merkle_root: merkle,
            utxo_root: utxo,
            total_supply: supply,
            validator_address: "lac1validator".into(),
            validator_level: 5,
            timestamp: 1_000,
            witness_signatures: vec![],
            witness_addresses: vec![],
            previous_commitment: String::new(),
        }
    }

    fn accounts() -> AccountSnapshot {
        [("lac1a".to_string(), 100.0), ("lac1b".to_string(), 50.0)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_honest_commitment_passes() {
        let config = ZeroHistoryConfig::dev();
        let blocks = vec![l3(1, "h1"), l3(2, "h2")];
        let refs: Vec<&L3Block> = blocks.iter().collect();
        let accounts = accounts();
        let commitment = honest_commitment(&refs, &accounts);

        let mut detector = FraudDetector::new();
        let found = detector
            .auto_detect(&config, &commitment, &refs, &accounts, 2_000)
            .unwrap();
        assert!(found.is_none());
        assert!(detector.is_empty());
    }

    #[test]
    fn test_bad_merkle_detected() {
        let config = ZeroHistoryConfig::dev();
        let blocks = vec![l3(1, "h1")];
        let refs: Vec<&L3Block> = blocks.iter().collect();
        let accounts = accounts();
        let mut commitment = honest_commitment(&refs, &accounts);
        commitment.merkle_root = "forged".into();

        let mut detector = FraudDetector::new();
        let proof = detector
            .auto_detect(&config, &commitment, &refs, &accounts, 2_000)
            .unwrap()
            .unwrap();
        assert_eq!(proof.proof_type, FraudType::InvalidMerkle);
        assert!(proof.verified);
        assert!(proof.compressed_size > 0 && proof.compressed_size <= 2_048);
    }

    #[test]
    fn test_bad_utxo_detected() {
        let config = ZeroHistoryConfig::dev();
        let blocks = vec![l3(1, "h1")];
        let refs: Vec<&L3Block> = blocks.iter().collect();
        let accounts = accounts();
        let mut commitment = honest_commitment(&refs, &accounts);
        commitment.utxo_root = "forged".into();

        let mut detector = FraudDetector::new();
        let proof = detector
            .auto_detect(&config, &commitment, &refs, &accounts, 2_000)
            .unwrap()
            .unwrap();
        assert_eq!(proof.proof_type, FraudType::InvalidUtxo);
    }

    #[test]
    fn test_supply_tolerance_boundary() {
        let config = ZeroHistoryConfig::dev();
        let blocks = vec![l3(1, "h1")];
        let refs: Vec<&L3Block> = blocks.iter().collect();
        let accounts = accounts();

        // within tolerance: fine
        let mut close = honest_commitment(&refs, &accounts);
        close.total_supply += 0.009;
        let mut detector = FraudDetector::new();
        assert!(detector
            .auto_detect(&config, &close, &refs, &accounts, 2_000)
            .unwrap()
            .is_none());

        // past tolerance: fraud
        let mut off = honest_commitment(&refs, &accounts);
        off.total_supply += 0.02;
        let proof = detector
            .auto_detect(&config, &off, &refs, &accounts, 2_000)
            .unwrap()
            .unwrap();
        assert_eq!(proof.proof_type, FraudType::InvalidState);
    }

    #[test]
    fn test_double_sign_detected() {
        let config = ZeroHistoryConfig::dev();
        let blocks = vec![l3(1, "h1")];
        let refs: Vec<&L3Block> = blocks.iter().collect();
        let accounts = accounts();

        let first = honest_commitment(&refs, &accounts);
        let mut second = first.clone();
        second.merkle_root = "different".into();

        let existing = vec![L1Entry {
            height_start: 1,
            height_end: first.block_height,
            commitment: first,
            checkpoint: false,
        }];

        let mut detector = FraudDetector::new();
        let proof = detector
            .detect_double_sign(&config, &existing, &second, 2_000)
            .unwrap()
            .unwrap();
        assert_eq!(proof.proof_type, FraudType::DoubleSign);
        assert!(proof.verified);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let config = ZeroHistoryConfig::dev();
        let blocks = vec![l3(1, "h1")];
        let refs: Vec<&L3Block> = blocks.iter().collect();
        let accounts = accounts();
        let mut commitment = honest_commitment(&refs, &accounts);
        commitment.merkle_root = "forged".into();

        let mut detector = FraudDetector::new();
        detector
            .auto_detect(&config, &commitment, &refs, &accounts, 2_000)
            .unwrap();

        let exported = detector.export();
        let mut restored = FraudDetector::new();
        restored.import(exported);
        assert_eq!(restored.len(), 1);
    }
}
