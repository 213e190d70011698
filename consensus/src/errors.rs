//! Consensus errors

use thiserror::Error;

/// Consensus result type
pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// Consensus errors
#[derive(Error, Debug)]
pub enum ConsensusError {
    /// Miner balance below the participation minimum
    #[error("Need {required} LAC minimum to mine, have {have}")]
    BelowMinimumBalance { required: f64, have: f64 },

    /// Proof submitted by an unregistered miner
    #[error("Miner not registered for this round: {0}")]
    UnknownMiner(String),
}
