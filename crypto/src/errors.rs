//! Crypto errors

use thiserror::Error;

/// Crypto result type
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Crypto errors
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Malformed key material
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A compressed point failed to decompress
    #[error("Invalid curve point: {0}")]
    InvalidPoint(String),

    /// Ring below the minimum size
    #[error("Ring too small: {got} members, need at least {min}")]
    RingTooSmall { got: usize, min: usize },

    /// Signer index outside the ring
    #[error("Signer index {index} out of range for ring of {ring}")]
    SignerIndexOutOfRange { index: usize, ring: usize },

    /// The signer's public key does not appear at the claimed ring position
    #[error("Signer key does not match ring position")]
    SignerNotInRing,

    /// AEAD encryption failure
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// AEAD decryption failure (wrong key, tampered ciphertext)
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Signature parse or verification failure
    #[error("Signature error: {0}")]
    Signature(String),

    /// Hex decoding failure
    #[error("Hex error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Entropy source failure
    #[error("Entropy error: {0}")]
    Entropy(String),
}
