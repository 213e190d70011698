//! Witness collection
//!
//! A commitment becomes final only after `min_witnesses` distinct
//! validators sign its hash within the five-minute window. Signatures
//! are real Ed25519: each one is verified against the witness's
//! registered public key before it counts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::errors::{ZeroHistoryError, ZeroHistoryResult};

/// An open request for witness signatures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessRequest {
    /// Request id
    pub request_id: String,
    /// Commitment hash being witnessed
    pub commitment_hash: String,
    /// Height of the commitment
    pub block_height: u64,
    /// Leader that created the commitment
    pub validator_address: String,
    /// Creation timestamp
    pub created_at: u64,
    /// Hard deadline
    pub deadline: u64,
    /// Collected signatures
    pub signatures: Vec<String>,
    /// Witness addresses, same order
    pub addresses: Vec<String>,
}

impl WitnessRequest {
    /// Whether the deadline passed
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.deadline
    }

    /// Whether enough signatures were collected
    pub fn has_enough(&self, min: usize) -> bool {
        self.signatures.len() >= min
    }
}

/// Collects witness signatures for pending commitments
#[derive(Debug, Default)]
pub struct WitnessCollector {
    pending: HashMap<String, WitnessRequest>,
    timeout_secs: u64,
}

impl WitnessCollector {
    /// Create a collector with the configured signature window
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            pending: HashMap::new(),
            timeout_secs,
        }
    }

    /// Open a request; returns its id
    pub fn create_request(
        &mut self,
        commitment_hash: &str,
        block_height: u64,
        validator_address: &str,
        now: u64,
    ) -> String {
        let request_id = hex::encode(Sha256::digest(
            format!("{commitment_hash}{block_height}{validator_address}{now}").as_bytes(),
        ))[..16]
            .to_string();

        let request = WitnessRequest {
            request_id: request_id.clone(),
            commitment_hash: commitment_hash.to_string(),
            block_height,
            validator_address: validator_address.to_string(),
            created_at: now,
            deadline: now + self.timeout_secs,
            signatures: Vec::new(),
            addresses: Vec::new(),
        };
        debug!(
            "witness request {request_id} for commitment {} at height {block_height}",
            &commitment_hash[..16.min(commitment_hash.len())]
        );
        self.pending.insert(request_id.clone(), request);
        request_id
    }

    /// Add one witness signature. The signature must be Ed25519 over
    /// the commitment hash bytes and verify against `witness_pubkey`.
    pub fn add_signature(
        &mut self,
        request_id: &str,
        witness_address: &str,
        signature_hex: &str,
        witness_pubkey_hex: &str,
        now: u64,
    ) -> ZeroHistoryResult<usize> {
        let request = self
            .pending
            .get_mut(request_id)
            .ok_or_else(|| ZeroHistoryError::UnknownRequest(request_id.to_string()))?;

        if request.is_expired(now) {
            return Err(ZeroHistoryError::RequestExpired(request_id.to_string()));
        }
        if request.addresses.iter().any(|a| a == witness_address) {
            return Err(ZeroHistoryError::DuplicateWitness(witness_address.to_string()));
        }
        if !lac_crypto::keys::verify_signature(
            witness_pubkey_hex,
            signature_hex,
            request.commitment_hash.as_bytes(),
        ) {
            return Err(ZeroHistoryError::BadWitnessSignature(
                witness_address.to_string(),
            ));
        }

        request.signatures.push(signature_hex.to_string());
        request.addresses.push(witness_address.to_string());
        Ok(request.signatures.len())
    }

    /// Read-only view of a pending request
    pub fn get(&self, request_id: &str) -> Option<&WitnessRequest> {
        self.pending.get(request_id)
    }

    /// Close a request. With enough signatures returns
    /// `(signatures, addresses)`; otherwise the request is discarded
    /// and the shortage is the error.
    pub fn finalize(
        &mut self,
        request_id: &str,
        min: usize,
    ) -> ZeroHistoryResult<(Vec<String>, Vec<String>)> {
        let request = self
            .pending
            .remove(request_id)
            .ok_or_else(|| ZeroHistoryError::UnknownRequest(request_id.to_string()))?;

        if !request.has_enough(min) {
            warn!(
                "witness request {request_id} dropped: {} of {min} signatures",
                request.signatures.len()
            );
            return Err(ZeroHistoryError::InsufficientWitnesses {
                got: request.signatures.len(),
                need: min,
            });
        }
        info!(
            "witness request {request_id} finalized with {} signatures",
            request.signatures.len()
        );
        Ok((request.signatures, request.addresses))
    }

    /// Drop expired requests; returns how many were removed
    pub fn cleanup_expired(&mut self, now: u64) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, r| !r.is_expired(now));
        before - self.pending.len()
    }

    /// Number of open requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
