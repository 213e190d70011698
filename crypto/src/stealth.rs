//! Dual-key stealth addresses
//!
//! A recipient publishes `(scan_pub, spend_pub)`. For each payment the
//! sender makes an ephemeral X25519 key `r`, derives the shared secret
//! `s = H(DH(r, scan_pub) ∥ ":lac:stealth")` and tags the output with the
//! one-time address `H(s ∥ spend_pub)`. Only the holder of `scan_priv`
//! can recompute `s` from the ephemeral public key and recognise the tag;
//! nothing on the wire links two payments to the same recipient.

use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::errors::{CryptoError, CryptoResult};
use crate::keys::{derive_material, x25519_public_from_hex};

const SHARED_SUFFIX: &[u8] = b":lac:stealth";
const OTA_PREFIX: &str = "lac1ota_";
const OTA_TAG_LEN: usize = 38;

/// A recipient's published stealth keys
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StealthPublic {
    /// Scan public key, hex
    pub scan: String,
    /// Spend public key, hex
    pub spend: String,
}

/// Full stealth key material for a wallet
pub struct StealthKeys {
    scan_secret: StaticSecret,
    spend_secret: StaticSecret,
    /// Scan public key
    pub scan_public: X25519Public,
    /// Spend public key
    pub spend_public: X25519Public,
}

impl StealthKeys {
    /// Derive scan and spend keypairs from a seed
    pub fn from_seed(seed: &str) -> Self {
        let scan_secret = StaticSecret::from(derive_material("stealth:scan", seed));
        let spend_secret = StaticSecret::from(derive_material("stealth:spend", seed));
        let scan_public = X25519Public::from(&scan_secret);
        let spend_public = X25519Public::from(&spend_secret);
        Self {
            scan_secret,
            spend_secret,
            scan_public,
            spend_public,
        }
    }

    /// Published form of these keys
    pub fn public(&self) -> StealthPublic {
        StealthPublic {
            scan: hex::encode(self.scan_public.to_bytes()),
            spend: hex::encode(self.spend_public.to_bytes()),
        }
    }

    /// The spend secret bytes, for deriving one-time spending material
    pub fn spend_secret_bytes(&self) -> [u8; 32] {
        self.spend_secret.to_bytes()
    }
}

/// A one-time address generated for a single payment
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OneTimeAddress {
    /// The on-chain address tag
    pub address: String,
    /// Sender's ephemeral public key, hex (on the wire)
    pub ephemeral_public: String,
    /// Shared secret, sender side only (never on the wire)
    #[serde(skip)]
    pub shared_secret: [u8; 32],
}

fn shared_from_dh(dh_bytes: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(dh_bytes);
    hasher.update(SHARED_SUFFIX);
    hasher.finalize().into()
}

fn ota_tag(shared: &[u8; 32], spend_public: &[u8; 32]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(shared);
    hasher.update(spend_public);
    let digest = hex::encode(hasher.finalize());
    format!("{OTA_PREFIX}{}", &digest[..OTA_TAG_LEN])
}

/// Sender side: derive a one-time address for a recipient's stealth keys.
pub fn generate_one_time_address(
    scan_public_hex: &str,
    spend_public_hex: &str,
) -> CryptoResult<OneTimeAddress> {
    let scan_public = x25519_public_from_hex(scan_public_hex)?;
    let spend_bytes = hex::decode(spend_public_hex)?;
    let spend_arr = <[u8; 32]>::try_from(spend_bytes.as_slice())
        .map_err(|_| CryptoError::InvalidKey("spend key must be 32 bytes".into()))?;

    let mut material = [0u8; 32];
    getrandom::getrandom(&mut material).map_err(|e| CryptoError::Entropy(e.to_string()))?;
    let ephemeral = StaticSecret::from(material);
    let ephemeral_public = X25519Public::from(&ephemeral);

    let shared = shared_from_dh(ephemeral.diffie_hellman(&scan_public).as_bytes());

    Ok(OneTimeAddress {
        address: ota_tag(&shared, &spend_arr),
        ephemeral_public: hex::encode(ephemeral_public.to_bytes()),
        shared_secret: shared,
    })
}

/// Recipient side: check whether a one-time address belongs to this seed.
pub fn detect_payment(seed: &str, ephemeral_public_hex: &str, address: &str) -> CryptoResult<bool> {
    let keys = StealthKeys::from_seed(seed);
    let ephemeral_public = x25519_public_from_hex(ephemeral_public_hex)?;
    let shared = shared_from_dh(keys.scan_secret.diffie_hellman(&ephemeral_public).as_bytes());
    let expected = ota_tag(&shared, &keys.spend_public.to_bytes());
    Ok(expected == address)
}
