//! LAC PoET Hybrid Consensus
//!
//! Leader selection by proof of elapsed time with a fairness split:
//! each block pays 19 winners of 10 LAC: the 12 fastest submitted
//! proofs (speed, capped at 3 wins per address) and 7 weighted-lottery
//! draws from every registered miner. Anti-pool, anti-domination and
//! newbie/early-adopter boosts keep any one party from owning the
//! schedule.

pub mod coordinator;
mod errors;
pub mod poet;

pub use coordinator::{MinerInfo, MiningCoordinator, MiningProof, RegisterOutcome, RoundOutcome};
pub use errors::{ConsensusError, ConsensusResult};
pub use poet::Poet;
