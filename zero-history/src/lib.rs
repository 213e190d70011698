//! LAC Zero-History Tiered Storage
//!
//! Raw history is disposable; the ability to verify is not. Blocks live
//! through three tiers:
//!
//! - **L3** (~30 days): full payload, transactions, messages, rewards,
//!   UTXO delta, spent key images.
//! - **L2** (~90 days): pruned to header, merkle/state roots, counts,
//!   fraud proof references.
//! - **L1** (forever): witnessed state commitments over block ranges.
//!
//! A staked validator set (L5/L6) produces commitments on a fixed
//! interval; witnesses countersign with real Ed25519 signatures; fraud
//! detection recomputes every committed root and punishes validators
//! whose commitments do not match. New nodes bootstrap from peer
//! commitment quorums instead of replaying history.

pub mod bootstrap;
pub mod checkpoint;
pub mod commitment;
pub mod config;
mod errors;
pub mod fraud;
pub mod manager;
pub mod recovery;
pub mod tiers;
pub mod validator;
pub mod witness;

pub use bootstrap::{BootstrapPackage, BootstrapPeer, Bootstrapper};
pub use checkpoint::CheckpointPolicy;
pub use commitment::{merkle_root_of, utxo_root, AccountSnapshot, StateCommitment};
pub use config::ZeroHistoryConfig;
pub use errors::{ZeroHistoryError, ZeroHistoryResult};
pub use fraud::{FraudDetector, FraudProof, FraudType};
pub use manager::{CommitmentOutcome, ZeroHistoryManager};
pub use recovery::{RecoveryLog, RecoverySnapshot};
pub use tiers::{L1Entry, L2Block, L3Block, TierStore};
pub use validator::{ValidatorInfo, ValidatorRegistry};
pub use witness::{WitnessCollector, WitnessRequest};
