//! LAC Node
//!
//! Wires the state store, privacy engine, PoET consensus and
//! zero-history manager into a running node: a 10-second block
//! production loop, a 60-second cleanup loop and a 30-second peer sync
//! loop, all cooperating through the store's single lock. Persistence
//! happens outside the lock; peers only ever see blocks that are
//! already durable locally.

pub mod cleanup;
mod error;
pub mod hooks;
pub mod node;
pub mod producer;
pub mod sync;

pub use cleanup::{run_cleanup_once, CleanupConfig, CleanupStats};
pub use error::{NodeError, NodeResult};
pub use hooks::{NullHooks, TxHooks};
pub use node::{Node, NodeConfig};
pub use producer::{BlockAssembler, BlockProducer, ProducerConfig};
pub use sync::{ChainSync, HttpTransport, PeerSet, PeerTransport, SyncConfig};

/// Current unix time in seconds
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
