//! Collaborator transaction hooks
//!
//! Username registry, timelock, dead-man-switch and game processors
//! live outside the core. Block application hands them each special
//! transaction inside the same critical section; the default hook does
//! nothing.

use lac_state::{LedgerState, Transaction};

/// Processors the API layer plugs into block application
pub trait TxHooks: Send + Sync {
    /// Called for every username/timelock/DMS/game transaction as a
    /// block is applied
    fn process(&self, _tx: &Transaction, _height: u64, _ledger: &mut LedgerState) {}

    /// Called once after a block's transactions are applied (timelock
    /// activation and similar height-driven work)
    fn after_block(&self, _height: u64, _ledger: &mut LedgerState) {}
}

/// No-op hooks for nodes running without collaborators
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHooks;

impl TxHooks for NullHooks {}

/// Whether a transaction variant is routed to the hooks
pub fn is_special(tx: &Transaction) -> bool {
    matches!(
        tx,
        Transaction::UsernameRegister { .. }
            | Transaction::BurnLevelUpgrade { .. }
            | Transaction::BurnNicknameChange { .. }
            | Transaction::ReferralBonus { .. }
            | Transaction::TimelockPending { .. }
            | Transaction::TimelockActivated { .. }
            | Transaction::TimelockCancelled { .. }
            | Transaction::DmsTrigger { .. }
            | Transaction::DmsCancel { .. }
            | Transaction::DiceMint { .. }
            | Transaction::DiceBurn { .. }
    )
}
