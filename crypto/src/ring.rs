//! Linkable ring signatures
//!
//! bLSAG-style scheme over edwards25519. The signer hides among a ring of
//! public keys; the key image `KI = x·Hp(P ∥ utxo_id)` is deterministic
//! per (signer key, output id), so spending the same output twice yields
//! the same image and is caught as a duplicate.
//!
//! Signing walks the ring: a random commitment at the signer's slot seeds
//! the challenge chain, every other slot gets a random response, and the
//! signer's response closes the ring. The verifier recomputes the whole
//! chain from `c0` and requires it to close back to `c0`.

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::errors::{CryptoError, CryptoResult};
use crate::keys::derive_material;

/// Minimum ring membership
pub const MIN_RING_SIZE: usize = 2;
/// Smallest ring built by decoy selection (6 decoys + signer)
pub const RING_TARGET_MIN: usize = 7;
/// Largest ring built by decoy selection (14 decoys + signer)
pub const RING_TARGET_MAX: usize = 15;

/// A linkable ring signature as it appears on chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RingSignature {
    /// Key image, compressed point hex. Duplicate image = double spend.
    pub key_image: String,
    /// Initial challenge, scalar hex
    pub c0: String,
    /// Per-member responses, scalar hex
    pub s: Vec<String>,
    /// Ring of compressed public keys, hex
    pub ring: Vec<String>,
    /// Ring size (redundant with `ring.len()`, kept on the wire)
    pub ring_size: usize,
    /// Unique output reference bound into the key image, hex
    pub utxo_tag: String,
}

/// Ring keypair: secret scalar and its public point
pub struct RingKeypair {
    secret: Scalar,
    /// Public point
    pub public: EdwardsPoint,
}

impl RingKeypair {
    /// Derive the ring keypair for a seed
    pub fn from_seed(seed: &str) -> Self {
        let material = derive_material("ring", seed);
        let secret = Scalar::from_bytes_mod_order(material);
        let public = EdwardsPoint::mul_base(&secret);
        Self { secret, public }
    }

    /// Compressed public key as hex
    pub fn public_hex(&self) -> String {
        hex::encode(self.public.compress().to_bytes())
    }
}

fn hash_to_scalar(domain: &str, parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update(part);
    }
    let digest: [u8; 64] = hasher.finalize().into();
    Scalar::from_bytes_mod_order_wide(&digest)
}

/// Simplified hash-to-point: `H(pk ∥ utxo)·G`
fn hash_to_point(public: &[u8; 32], utxo: &[u8]) -> EdwardsPoint {
    let scalar = hash_to_scalar("lac:h2p:", &[public, utxo]);
    EdwardsPoint::mul_base(&scalar)
}

fn challenge(message: &[u8], l: &EdwardsPoint, r: &EdwardsPoint) -> Scalar {
    hash_to_scalar(
        "lac:ring:",
        &[
            message,
            &l.compress().to_bytes(),
            &r.compress().to_bytes(),
        ],
    )
}

fn random_scalar() -> CryptoResult<Scalar> {
    let mut wide = [0u8; 64];
    getrandom::getrandom(&mut wide).map_err(|e| CryptoError::Entropy(e.to_string()))?;
    Ok(Scalar::from_bytes_mod_order_wide(&wide))
}

fn decode_point(hex_key: &str) -> CryptoResult<EdwardsPoint> {
    let bytes = hex::decode(hex_key)?;
    let compressed = CompressedEdwardsY::from_slice(&bytes)
        .map_err(|_| CryptoError::InvalidPoint(format!("bad length {}", bytes.len())))?;
    compressed
        .decompress()
        .ok_or_else(|| CryptoError::InvalidPoint(hex_key.chars().take(16).collect()))
}

fn decode_scalar(hex_scalar: &str) -> CryptoResult<Scalar> {
    let bytes = hex::decode(hex_scalar)?;
    let arr = <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| CryptoError::InvalidKey(format!("scalar length {}", bytes.len())))?;
    Option::from(Scalar::from_canonical_bytes(arr))
        .ok_or_else(|| CryptoError::InvalidKey("non-canonical scalar".into()))
}

/// Compute the key image for a seed and output reference
pub fn key_image(seed: &str, utxo_id: &[u8]) -> String {
    let keypair = RingKeypair::from_seed(seed);
    let base = hash_to_point(&keypair.public.compress().to_bytes(), utxo_id);
    hex::encode((keypair.secret * base).compress().to_bytes())
}

/// Create a ring signature over `message`.
///
/// `ring` holds compressed public keys in hex; the signer's key must sit
/// at `signer_index`. `utxo_id` is the unique output reference bound into
/// the key image.
pub fn sign(
    seed: &str,
    message: &[u8],
    ring: &[String],
    signer_index: usize,
    utxo_id: &[u8],
) -> CryptoResult<RingSignature> {
    let n = ring.len();
    if n < MIN_RING_SIZE {
        return Err(CryptoError::RingTooSmall {
            got: n,
            min: MIN_RING_SIZE,
        });
    }
    if signer_index >= n {
        return Err(CryptoError::SignerIndexOutOfRange {
            index: signer_index,
            ring: n,
        });
    }

    let keypair = RingKeypair::from_seed(seed);
    if ring[signer_index] != keypair.public_hex() {
        return Err(CryptoError::SignerNotInRing);
    }

    let points: Vec<EdwardsPoint> = ring
        .iter()
        .map(|k| decode_point(k))
        .collect::<CryptoResult<_>>()?;
    let bases: Vec<EdwardsPoint> = points
        .iter()
        .map(|p| hash_to_point(&p.compress().to_bytes(), utxo_id))
        .collect();

    let image = keypair.secret * bases[signer_index];

    let alpha = random_scalar()?;
    let mut c = vec![Scalar::ZERO; n];
    let mut s = vec![Scalar::ZERO; n];

    c[(signer_index + 1) % n] = challenge(
        message,
        &EdwardsPoint::mul_base(&alpha),
        &(alpha * bases[signer_index]),
    );

    let mut i = (signer_index + 1) % n;
    while i != signer_index {
        s[i] = random_scalar()?;
        let l = EdwardsPoint::mul_base(&s[i]) + c[i] * points[i];
        let r = s[i] * bases[i] + c[i] * image;
        c[(i + 1) % n] = challenge(message, &l, &r);
        i = (i + 1) % n;
    }

    s[signer_index] = alpha - c[signer_index] * keypair.secret;

    Ok(RingSignature {
        key_image: hex::encode(image.compress().to_bytes()),
        c0: hex::encode(c[0].to_bytes()),
        s: s.iter().map(|v| hex::encode(v.to_bytes())).collect(),
        ring: ring.to_vec(),
        ring_size: n,
        utxo_tag: hex::encode(utxo_id),
    })
}

/// Verify a ring signature. The challenge chain must close back to `c0`.
pub fn verify(signature: &RingSignature, message: &[u8]) -> bool {
    let n = signature.ring.len();
    if n < MIN_RING_SIZE || signature.s.len() != n || signature.ring_size != n {
        return false;
    }
    let Ok(utxo_id) = hex::decode(&signature.utxo_tag) else {
        return false;
    };
    let Ok(image) = decode_point(&signature.key_image) else {
        return false;
    };
    let Ok(c0) = decode_scalar(&signature.c0) else {
        return false;
    };
    let Ok(points) = signature
        .ring
        .iter()
        .map(|k| decode_point(k))
        .collect::<CryptoResult<Vec<_>>>()
    else {
        return false;
    };
    let Ok(s) = signature
        .s
        .iter()
        .map(|v| decode_scalar(v))
        .collect::<CryptoResult<Vec<_>>>()
    else {
        return false;
    };

    let mut c = c0;
    for i in 0..n {
        let base = hash_to_point(&points[i].compress().to_bytes(), &utxo_id);
        let l = EdwardsPoint::mul_base(&s[i]) + c * points[i];
        let r = s[i] * base + c * image;
        c = challenge(message, &l, &r);
    }
    c == c0
}

/// Build a ring for a signer from candidate decoy keys.
///
/// Picks 6–14 decoys uniformly from the candidates (excluding the signer),
/// padding with hash-derived fakes when too few are known, then inserts
/// the signer at a uniformly random index. Returns the ring and that index.
pub fn select_ring(candidates: &[String], signer_public: &str) -> CryptoResult<(Vec<String>, usize)> {
    let mut rng = rand::thread_rng();
    let decoy_target = rng.gen_range(RING_TARGET_MIN - 1..=RING_TARGET_MAX - 1);

    let pool: Vec<&String> = candidates.iter().filter(|k| *k != signer_public).collect();
    let mut decoys: Vec<String> = pool
        .choose_multiple(&mut rng, decoy_target.min(pool.len()))
        .map(|k| (*k).clone())
        .collect();

    while decoys.len() < decoy_target {
        let mut entropy = [0u8; 32];
        getrandom::getrandom(&mut entropy).map_err(|e| CryptoError::Entropy(e.to_string()))?;
        let fake = EdwardsPoint::mul_base(&hash_to_scalar("lac:decoy:", &[&entropy]));
        decoys.push(hex::encode(fake.compress().to_bytes()));
    }

    let signer_index = rng.gen_range(0..=decoys.len());
    let mut ring = decoys;
    ring.insert(signer_index, signer_public.to_string());
    Ok((ring, signer_index))
}
