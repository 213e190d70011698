//! Canonical transaction encoding and signing
//!
//! The signing rule is defined once and shared by every transaction
//! variant: serialize the object with sorted keys and no whitespace,
//! with the `signature` and `pubkey` fields removed. `serde_json`'s
//! default map is ordered, so serializing a `Value` already yields
//! sorted keys.

use serde_json::Value;

use crate::errors::{CryptoError, CryptoResult};
use crate::keys::{verify_signature, SigningKeys};

/// Fields stripped before hashing or signing
const EXCLUDED_FIELDS: [&str; 2] = ["signature", "pubkey"];

/// Canonical byte encoding of a transaction value.
pub fn canonical_bytes(tx: &Value) -> Vec<u8> {
    let mut stripped = tx.clone();
    if let Value::Object(map) = &mut stripped {
        for field in EXCLUDED_FIELDS {
            map.remove(field);
        }
    }
    serde_json::to_vec(&stripped).unwrap_or_default()
}

/// SHA-256 over the canonical encoding, as hex
pub fn canonical_hash(tx: &Value) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(canonical_bytes(tx)))
}

/// Sign a transaction in place, attaching `signature` and `pubkey`.
pub fn sign_transaction(seed: &str, tx: &mut Value) -> CryptoResult<()> {
    let Value::Object(_) = tx else {
        return Err(CryptoError::Signature("transaction is not an object".into()));
    };
    let message = canonical_bytes(tx);
    let keys = SigningKeys::from_seed(seed);
    let signature = keys.sign(&message);
    let map = tx.as_object_mut().expect("checked above");
    map.insert("signature".into(), Value::String(signature));
    map.insert("pubkey".into(), Value::String(keys.public_hex()));
    Ok(())
}

/// Verify a transaction's signature against its canonical encoding.
///
/// Transactions without `signature`/`pubkey` are legacy unsigned and
/// accepted; anything signed must verify.
pub fn verify_transaction(tx: &Value) -> bool {
    let (Some(signature), Some(pubkey)) = (
        tx.get("signature").and_then(Value::as_str),
        tx.get("pubkey").and_then(Value::as_str),
    ) else {
        return true;
    };
    verify_signature(pubkey, signature, &canonical_bytes(tx))
}
