//! State errors

use thiserror::Error;

/// State result type
pub type StateResult<T> = Result<T, StateError>;

/// State errors
#[derive(Error, Debug)]
pub enum StateError {
    /// IO error during persistence
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Crypto error
    #[error("Crypto error: {0}")]
    Crypto(#[from] lac_crypto::CryptoError),

    /// Seed failed format validation
    #[error("Invalid seed")]
    InvalidSeed,

    /// Recipient could not be resolved to a wallet
    #[error("Recipient not found: {0}")]
    UnknownRecipient(String),

    /// Amount is zero, negative or non-finite
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    /// Caller exceeded a rate limit
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Wallet does not exist
    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    /// Username already registered
    #[error("Username taken: {0}")]
    UsernameTaken(String),

    /// Username failed format validation
    #[error("Invalid username: {0}")]
    UsernameFormat(String),

    /// Balance below what the operation needs
    #[error("Insufficient balance: need {need} LAC, have {have}")]
    InsufficientBalance { need: f64, have: f64 },

    /// Key image already seen by the chain
    #[error("Double-spend rejected: key image already used")]
    DuplicateKeyImage(String),

    /// STASH nullifier already in the spent set
    #[error("STASH key already spent")]
    DuplicateNullifier,

    /// STASH pool cannot cover the withdrawal
    #[error("Insufficient pool balance: need {need} LAC, have {have}")]
    StashInsufficientPool { need: f64, have: f64 },

    /// Timelock unlock height is not in the future
    #[error("Unlock block {unlock} is not after current height {height}")]
    UnlockBlockInPast { unlock: u64, height: u64 },

    /// Referral code does not exist or the link was already set
    #[error("Invalid referral: {0}")]
    InvalidReferral(String),

    /// Chain linkage invariant broken
    #[error("Chain link broken at height {height}")]
    ChainLinkBroken { height: u64 },

    /// Supply conservation invariant broken
    #[error("Conservation violated: emitted-burned {expected}, observed {actual}")]
    ConservationViolated { expected: f64, actual: f64 },

    /// A wallet balance went negative
    #[error("Negative balance on {0}")]
    NegativeBalance(String),
}
