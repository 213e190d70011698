//! Transaction variants
//!
//! One tagged enum covers every transaction the chain carries; block
//! application matches on it exhaustively. The canonical signing rule
//! (sorted keys, no whitespace, `signature`/`pubkey` removed) lives in
//! `lac_crypto::canonical` and is shared by all variants.

use lac_crypto::ring::RingSignature;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transaction {
    /// Public value transfer
    Transfer {
        from: String,
        to: String,
        amount: f64,
        fee: f64,
        timestamp: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pubkey: Option<String>,
    },

    /// Anonymous transfer: ring-signed, one-time address, amount hidden.
    /// `real_*` fields are node-local reconciliation data; phantoms carry
    /// none of them.
    VeilTransfer {
        tx_id: String,
        /// Always "anonymous" on the wire
        from: String,
        /// One-time address tag
        to: String,
        /// Always 0 on the wire
        amount: f64,
        fee: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        real_from: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        real_to: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        real_amount: Option<f64>,
        /// Sender's ephemeral stealth pubkey, hex
        ephemeral: String,
        /// Hash of the encrypted payload
        payload_hash: String,
        ring_signature: RingSignature,
        timestamp: u64,
        anonymous: bool,
    },

    /// Deposit of a fixed nominal into the shielded pool
    StashDeposit {
        /// Always "anonymous"
        from: String,
        /// Always "stash_pool"
        to: String,
        amount: f64,
        fee: f64,
        nominal_code: u8,
        nullifier_hash: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        real_from: Option<String>,
        timestamp: u64,
    },

    /// Withdrawal of a nominal from the shielded pool
    StashWithdraw {
        /// Always "stash_pool"
        from: String,
        /// One-time hint, never the recipient address
        to: String,
        amount: f64,
        fee: f64,
        nominal_code: u8,
        nullifier: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        real_to: Option<String>,
        timestamp: u64,
    },

    /// Faucet grant
    Faucet { to: String, amount: f64, timestamp: u64 },

    /// Burn for a level upgrade
    BurnLevelUpgrade {
        from: String,
        amount: f64,
        new_level: u8,
        timestamp: u64,
    },

    /// Burn for a nickname change
    BurnNicknameChange {
        from: String,
        amount: f64,
        nickname: String,
        timestamp: u64,
    },

    /// Username registration
    UsernameRegister {
        from: String,
        username: String,
        fee: f64,
        timestamp: u64,
    },

    /// Referral bonus payout
    ReferralBonus {
        to: String,
        amount: f64,
        invite_code: String,
        timestamp: u64,
    },

    /// Timelocked transfer created
    TimelockPending {
        from: String,
        to: String,
        amount: f64,
        unlock_block: u64,
        timestamp: u64,
    },

    /// Timelocked transfer released
    TimelockActivated {
        from: String,
        to: String,
        amount: f64,
        unlock_block: u64,
        timestamp: u64,
    },

    /// Timelocked transfer cancelled
    TimelockCancelled {
        from: String,
        amount: f64,
        unlock_block: u64,
        timestamp: u64,
    },

    /// Dead-man-switch fired
    DmsTrigger {
        from: String,
        to: String,
        amount: f64,
        timestamp: u64,
    },

    /// Dead-man-switch disarmed
    DmsCancel { from: String, timestamp: u64 },

    /// Dice game win minted
    DiceMint { to: String, amount: f64, timestamp: u64 },

    /// Dice game loss burned
    DiceBurn { from: String, amount: f64, timestamp: u64 },
}

impl Transaction {
    /// Wire tag of this variant
    pub fn type_name(&self) -> &'static str {
        match self {
            Transaction::Transfer { .. } => "transfer",
            Transaction::VeilTransfer { .. } => "veil_transfer",
            Transaction::StashDeposit { .. } => "stash_deposit",
            Transaction::StashWithdraw { .. } => "stash_withdraw",
            Transaction::Faucet { .. } => "faucet",
            Transaction::BurnLevelUpgrade { .. } => "burn_level_upgrade",
            Transaction::BurnNicknameChange { .. } => "burn_nickname_change",
            Transaction::UsernameRegister { .. } => "username_register",
            Transaction::ReferralBonus { .. } => "referral_bonus",
            Transaction::TimelockPending { .. } => "timelock_pending",
            Transaction::TimelockActivated { .. } => "timelock_activated",
            Transaction::TimelockCancelled { .. } => "timelock_cancelled",
            Transaction::DmsTrigger { .. } => "dms_trigger",
            Transaction::DmsCancel { .. } => "dms_cancel",
            Transaction::DiceMint { .. } => "dice_mint",
            Transaction::DiceBurn { .. } => "dice_burn",
        }
    }

    /// Transaction timestamp
    pub fn timestamp(&self) -> u64 {
        match self {
            Transaction::Transfer { timestamp, .. }
            | Transaction::VeilTransfer { timestamp, .. }
            | Transaction::StashDeposit { timestamp, .. }
            | Transaction::StashWithdraw { timestamp, .. }
            | Transaction::Faucet { timestamp, .. }
            | Transaction::BurnLevelUpgrade { timestamp, .. }
            | Transaction::BurnNicknameChange { timestamp, .. }
            | Transaction::UsernameRegister { timestamp, .. }
            | Transaction::ReferralBonus { timestamp, .. }
            | Transaction::TimelockPending { timestamp, .. }
            | Transaction::TimelockActivated { timestamp, .. }
            | Transaction::TimelockCancelled { timestamp, .. }
            | Transaction::DmsTrigger { timestamp, .. }
            | Transaction::DmsCancel { timestamp, .. }
            | Transaction::DiceMint { timestamp, .. }
            | Transaction::DiceBurn { timestamp, .. } => *timestamp,
        }
    }

    /// Fee carried by this transaction, 0 where the variant has none
    pub fn fee(&self) -> f64 {
        match self {
            Transaction::Transfer { fee, .. }
            | Transaction::VeilTransfer { fee, .. }
            | Transaction::StashDeposit { fee, .. }
            | Transaction::StashWithdraw { fee, .. }
            | Transaction::UsernameRegister { fee, .. } => *fee,
            _ => 0.0,
        }
    }

    /// Public (on-wire) amount
    pub fn amount(&self) -> f64 {
        match self {
            Transaction::Transfer { amount, .. }
            | Transaction::VeilTransfer { amount, .. }
            | Transaction::StashDeposit { amount, .. }
            | Transaction::StashWithdraw { amount, .. }
            | Transaction::Faucet { amount, .. }
            | Transaction::BurnLevelUpgrade { amount, .. }
            | Transaction::BurnNicknameChange { amount, .. }
            | Transaction::ReferralBonus { amount, .. }
            | Transaction::TimelockPending { amount, .. }
            | Transaction::TimelockActivated { amount, .. }
            | Transaction::TimelockCancelled { amount, .. }
            | Transaction::DmsTrigger { amount, .. }
            | Transaction::DiceMint { amount, .. }
            | Transaction::DiceBurn { amount, .. } => *amount,
            Transaction::DmsCancel { .. } | Transaction::UsernameRegister { .. } => 0.0,
        }
    }

    /// Ring signature, for ring-bearing variants
    pub fn ring_signature(&self) -> Option<&RingSignature> {
        match self {
            Transaction::VeilTransfer { ring_signature, .. } => Some(ring_signature),
            _ => None,
        }
    }

    /// Key image recorded by this transaction, if any
    pub fn key_image(&self) -> Option<&str> {
        self.ring_signature().map(|sig| sig.key_image.as_str())
    }

    /// Rewrite address references during legacy-address migration
    pub fn migrate_address(&mut self, old: &str, new: &str) {
        let rewrite = |field: &mut String| {
            if field == old {
                *field = new.to_string();
            }
        };
        let rewrite_opt = |field: &mut Option<String>| {
            if field.as_deref() == Some(old) {
                *field = Some(new.to_string());
            }
        };
        match self {
            Transaction::Transfer { from, to, .. } => {
                rewrite(from);
                rewrite(to);
            }
            Transaction::VeilTransfer {
                real_from, real_to, ..
            } => {
                rewrite_opt(real_from);
                rewrite_opt(real_to);
            }
            Transaction::StashDeposit { real_from, .. } => rewrite_opt(real_from),
            Transaction::StashWithdraw { real_to, .. } => rewrite_opt(real_to),
            Transaction::Faucet { to, .. }
            | Transaction::ReferralBonus { to, .. }
            | Transaction::DiceMint { to, .. } => rewrite(to),
            Transaction::BurnLevelUpgrade { from, .. }
            | Transaction::BurnNicknameChange { from, .. }
            | Transaction::UsernameRegister { from, .. }
            | Transaction::TimelockCancelled { from, .. }
            | Transaction::DmsCancel { from, .. }
            | Transaction::DiceBurn { from, .. } => rewrite(from),
            Transaction::TimelockPending { from, to, .. }
            | Transaction::TimelockActivated { from, to, .. }
            | Transaction::DmsTrigger { from, to, .. } => {
                rewrite(from);
                rewrite(to);
            }
        }
    }

    /// Serialize to a JSON value (for canonical hashing/signing)
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Canonical SHA-256 hash of this transaction
    pub fn hash(&self) -> String {
        lac_crypto::canonical::canonical_hash(&self.to_value())
    }
}
