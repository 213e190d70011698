//! LAC: an anonymous, privacy-preserving ledger
//!
//! This is the root crate that re-exports every LAC component for
//! integration testing and gives embedders one import for the whole
//! protocol.
//!
//! ## Crate Organization
//!
//! - `lac-crypto`: signing, ring signatures, stealth addresses,
//!   encrypted messaging
//! - `lac-state`: the single-lock state store and crash-safe
//!   persistence
//! - `lac-mempool`: bounded FIFO pool and the just-in-time queue
//! - `lac-privacy`: VEIL transfers and the STASH shielded pool
//! - `lac-consensus`: PoET hybrid mining (speed + lottery)
//! - `lac-zero-history`: L3/L2/L1 tiered storage, commitments,
//!   witnesses, fraud proofs, bootstrap
//! - `lac-node`: the block production, cleanup and peer sync loops

pub use lac_consensus as consensus;
pub use lac_crypto as crypto;
pub use lac_mempool as mempool;
pub use lac_node as node;
pub use lac_privacy as privacy;
pub use lac_state as state;
pub use lac_zero_history as zero_history;

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for embedders and tests
pub mod prelude {
    pub use lac_consensus::{MiningCoordinator, Poet};
    pub use lac_crypto::{RingKeypair, SigningKeys, StealthKeys};
    pub use lac_node::{BlockProducer, Node, NodeConfig, NullHooks, ProducerConfig};
    pub use lac_privacy::{StashKey, VeilReceipt};
    pub use lac_state::{Block, StateStore, Transaction, Wallet};
    pub use lac_zero_history::{ZeroHistoryConfig, ZeroHistoryManager};
}
