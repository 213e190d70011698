//! LAC Privacy Transaction Engine
//!
//! Two ways to move value without leaving a trail:
//!
//! - **VEIL** transfers hide the sender inside a ring signature, the
//!   recipient behind a one-time stealth address, and the value behind
//!   structural identity with 4–10 phantom transactions.
//! - **STASH** locks fixed nominals into a shielded pool; withdrawal
//!   presents an offline key whose nullifier has never been seen. No
//!   on-chain link between deposit and withdrawal is expressible.
//!
//! Both engines mutate ledger state handed to them inside a caller-held
//! critical section and never perform I/O themselves.

mod errors;
pub mod stash;
pub mod veil;

pub use errors::{PrivacyError, PrivacyResult};
pub use stash::{deposit, nominal_amount, withdraw, DepositReceipt, StashKey, WithdrawReceipt, STASH_FEE};
pub use veil::{validate_veil_transaction, veil_transfer, VeilReceipt, VEIL_FEE};
