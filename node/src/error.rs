//! Node errors

use thiserror::Error;

/// Node result type
pub type NodeResult<T> = Result<T, NodeError>;

/// Node errors
#[derive(Error, Debug)]
pub enum NodeError {
    /// State store error
    #[error("State error: {0}")]
    State(#[from] lac_state::StateError),

    /// Privacy engine error
    #[error("Privacy error: {0}")]
    Privacy(#[from] lac_privacy::PrivacyError),

    /// Consensus error
    #[error("Consensus error: {0}")]
    Consensus(#[from] lac_consensus::ConsensusError),

    /// Zero-history error
    #[error("Zero-history error: {0}")]
    ZeroHistory(#[from] lac_zero_history::ZeroHistoryError),

    /// Crypto error
    #[error("Crypto error: {0}")]
    Crypto(#[from] lac_crypto::CryptoError),

    /// Peer HTTP error
    #[error("Peer request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Key image conflict inside an own-assembled block. Should be
    /// impossible; aborts the block.
    #[error("Fatal: key image conflict in own block: {0}")]
    KeyImageConflict(String),

    /// Peer block failed validation
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// Sync failure
    #[error("Sync error: {0}")]
    Sync(String),
}
