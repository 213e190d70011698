//! Zero-history errors

use thiserror::Error;

/// Zero-history result type
pub type ZeroHistoryResult<T> = Result<T, ZeroHistoryError>;

/// Zero-history errors
#[derive(Error, Debug)]
pub enum ZeroHistoryError {
    /// Persistence failure
    #[error(transparent)]
    State(#[from] lac_state::StateError),

    /// JSON (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validator registration failed level/stake gates
    #[error("Validator ineligible: level {level}, stake {stake} (need {required})")]
    ValidatorIneligible { level: u8, stake: f64, required: f64 },

    /// Witness request id not found
    #[error("Unknown witness request: {0}")]
    UnknownRequest(String),

    /// Witness request past its deadline
    #[error("Witness request expired: {0}")]
    RequestExpired(String),

    /// Same witness signed twice
    #[error("Duplicate witness: {0}")]
    DuplicateWitness(String),

    /// Witness signature failed verification
    #[error("Bad witness signature from {0}")]
    BadWitnessSignature(String),

    /// Not enough witnesses before the deadline
    #[error("Insufficient witnesses: got {got}, need {need}")]
    InsufficientWitnesses { got: usize, need: usize },

    /// Bootstrap needs more peers
    #[error("Insufficient peers: got {got}, need {need}")]
    InsufficientPeers { got: usize, need: usize },

    /// Peers disagree on the latest commitment
    #[error("No commitment consensus among peers")]
    NoConsensus,

    /// Downloaded UTXO set does not match the committed root
    #[error("UTXO set does not match committed root")]
    UtxoMismatch,

    /// Commitment chain failed verification
    #[error("Commitment chain verification failed: {0}")]
    ChainVerificationFailed(String),

    /// Compressed fraud proof exceeds the size bound
    #[error("Fraud proof too large: {0} bytes")]
    FraudProofTooLarge(usize),
}
