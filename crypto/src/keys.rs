//! Deterministic key derivation
//!
//! Every key a wallet uses is derived from its seed string through a
//! per-purpose label, so a seed alone restores signing, messaging and
//! stealth capability. Labels keep the derivation paths disjoint:
//! `ed25519`, `x25519`, `stealth:scan`, `stealth:spend`, `ring`.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroize;

use crate::errors::{CryptoError, CryptoResult};

/// Derive 32 bytes of private key material for a purpose label.
///
/// `SHA-512("lac:<label>:<seed>")[..32]`
pub fn derive_material(label: &str, seed: &str) -> [u8; 32] {
    let mut hasher = Sha512::new();
    hasher.update(format!("lac:{label}:{seed}").as_bytes());
    let digest = hasher.finalize();
    let mut material = [0u8; 32];
    material.copy_from_slice(&digest[..32]);
    material
}

/// Ed25519 signing keypair derived from a seed
pub struct SigningKeys {
    signing: SigningKey,
    /// Public verification key
    pub verifying: VerifyingKey,
}

impl SigningKeys {
    /// Derive the signing keypair for a seed
    pub fn from_seed(seed: &str) -> Self {
        let mut material = derive_material("ed25519", seed);
        let signing = SigningKey::from_bytes(&material);
        material.zeroize();
        let verifying = signing.verifying_key();
        Self { signing, verifying }
    }

    /// Sign a message, returning the 64-byte signature as hex
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing.sign(message).to_bytes())
    }

    /// Public key as hex
    pub fn public_hex(&self) -> String {
        hex::encode(self.verifying.to_bytes())
    }
}

/// Verify an Ed25519 signature. Fails closed on any malformed input.
pub fn verify_signature(public_hex: &str, signature_hex: &str, message: &[u8]) -> bool {
    let Ok(pk_bytes) = hex::decode(public_hex) else {
        return false;
    };
    let Ok(pk_arr) = <[u8; 32]>::try_from(pk_bytes.as_slice()) else {
        return false;
    };
    let Ok(verifying) = VerifyingKey::from_bytes(&pk_arr) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    verifying.verify(message, &signature).is_ok()
}

/// X25519 keypair for encrypted messaging
pub struct MessagingKeys {
    /// DH secret
    pub secret: StaticSecret,
    /// DH public key
    pub public: X25519Public,
}

impl MessagingKeys {
    /// Derive the messaging keypair for a seed
    pub fn from_seed(seed: &str) -> Self {
        let material = derive_material("x25519", seed);
        let secret = StaticSecret::from(material);
        let public = X25519Public::from(&secret);
        Self { secret, public }
    }

    /// Public key as hex
    pub fn public_hex(&self) -> String {
        hex::encode(self.public.to_bytes())
    }
}

/// Parse a hex-encoded X25519 public key
pub fn x25519_public_from_hex(public_hex: &str) -> CryptoResult<X25519Public> {
    let bytes = hex::decode(public_hex)?;
    let arr = <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| CryptoError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
    Ok(X25519Public::from(arr))
}
