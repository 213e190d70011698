//! Privacy engine errors

use thiserror::Error;

/// Privacy result type
pub type PrivacyResult<T> = Result<T, PrivacyError>;

/// Privacy engine errors
#[derive(Error, Debug)]
pub enum PrivacyError {
    /// State-level failure (unknown wallet, balance, nullifier reuse)
    #[error(transparent)]
    State(#[from] lac_state::StateError),

    /// Crypto failure while building a ring or stealth address
    #[error(transparent)]
    Crypto(#[from] lac_crypto::CryptoError),

    /// Key image already seen by the chain
    #[error("Double-spend rejected")]
    DoubleSpend,

    /// Ring signature failed verification
    #[error("Invalid ring signature")]
    InvalidRingSignature,

    /// STASH key string could not be parsed
    #[error("Invalid STASH key format: {0}")]
    InvalidStashKey(String),

    /// Nominal code outside 0..=3
    #[error("Invalid nominal code {0}. Use: 0=100, 1=1K, 2=10K, 3=100K")]
    UnknownNominal(u8),
}
