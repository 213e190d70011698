//! LAC State Store
//!
//! The single in-process owner of all mutable ledger state: the chain,
//! wallets, usernames, mempool, key-image set, shielded pool, counters
//! and message collections. Every mutator takes the store's one coarse
//! lock for a bounded critical section; disk I/O happens on a snapshot
//! taken under the lock and written after release.
//!
//! Persistence is one JSON document per collection under the node's data
//! directory, written with the atomic-rename protocol and a `.backup`
//! sibling, and loaded main-then-backup-then-empty.

pub mod account;
pub mod block;
mod errors;
pub mod messages;
pub mod persist;
pub mod stash;
pub mod store;
pub mod transaction;

pub use account::{address_from_seed, key_id_from_seed, legacy_address, MiningRecord, Wallet};
pub use block::{compute_block_hash, Block, RewardRecord};
pub use errors::{StateError, StateResult};
pub use messages::{EphemeralMessage, Group, GroupPost, PersistentMessage};
pub use stash::{StashDeposit, StashPool};
pub use store::{Counters, LedgerState, SavedEvent, StateStore};
pub use transaction::Transaction;

/// Minimum fee for a public transfer, in LAC
pub const MIN_TX_FEE: f64 = 0.1;
/// Burn sink address
pub const BURN_ADDRESS: &str = "lac_0000000000000000000000000000000000000000";
