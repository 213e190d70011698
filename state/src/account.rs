//! Accounts and addresses
//!
//! Addresses are `lac1` + 34 charset characters of the seed hash + a
//! 4-character checksum, using the LAC charset (no `1`, `b`, `i`, `o`).
//! The legacy `seed_<hex40>` form is still recognised and migrated on
//! first sight by the store.

use lac_crypto::StealthPublic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// LAC bech32-style address charset
pub const ADDRESS_CHARSET: &str = "qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Address body length after the `lac1` prefix
const BODY_LEN: usize = 34;
/// Checksum length
const CHECKSUM_LEN: usize = 4;

/// Mining history entries kept per wallet
pub const MAX_MINING_HISTORY: usize = 10_000;

fn to_charset(data: &[u8], length: usize) -> String {
    let charset: Vec<char> = ADDRESS_CHARSET.chars().collect();
    let mut out = String::with_capacity(length);
    for b in data {
        out.push(charset[(*b as usize) % 32]);
        if out.len() >= length {
            break;
        }
        out.push(charset[((*b >> 5) as usize) % 32]);
        if out.len() >= length {
            break;
        }
    }
    out.truncate(length);
    out
}

/// Derive the `lac1…` address for a seed
pub fn address_from_seed(seed: &str) -> String {
    let raw = Sha256::digest(seed.as_bytes());
    let body = to_charset(&raw, BODY_LEN);
    let checksum_input = format!("lac1{body}");
    let checksum = to_charset(&Sha256::digest(checksum_input.as_bytes()), CHECKSUM_LEN);
    format!("lac1{body}{checksum}")
}

/// Legacy `seed_<hex40>` address, recognised for migration
pub fn legacy_address(seed: &str) -> String {
    let digest = hex::encode(Sha256::digest(seed.as_bytes()));
    format!("seed_{}", &digest[..40])
}

/// Private key id for a seed (never shown to other users)
pub fn key_id_from_seed(seed: &str) -> String {
    hex::encode(Sha256::digest(format!("keyid_{seed}").as_bytes()))
}

/// Seed format check: 18-word mnemonic, or a 32–128 char single token
pub fn validate_seed(seed: &str) -> bool {
    let seed = seed.trim();
    if seed.is_empty() {
        return false;
    }
    let words: Vec<&str> = seed.split_whitespace().collect();
    if words.len() == 18 {
        return true;
    }
    (32..=128).contains(&seed.len()) && !seed.contains(' ')
}

/// One mining win recorded in a wallet's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MiningRecord {
    /// Block height of the win
    pub block: u64,
    /// Reward credited, LAC
    pub reward: f64,
    /// Block timestamp
    pub timestamp: u64,
}

/// Dead-man-switch configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadManSwitch {
    /// Address receiving the balance on trigger
    pub beneficiary: String,
    /// Inactivity window before the switch fires, seconds
    pub timeout_secs: u64,
    /// Last owner check-in
    pub last_checkin: u64,
}

/// An account as stored in `wallets.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Balance in LAC
    pub balance: f64,
    /// Level 0..=7
    pub level: u8,
    /// Private key id
    pub key_id: String,
    /// Registration timestamp
    pub created_at: u64,
    /// Transactions sent or received
    #[serde(default)]
    pub tx_count: u64,
    /// Messages sent
    #[serde(default)]
    pub msg_count: u64,
    /// Last activity timestamp
    #[serde(default)]
    pub last_activity: u64,
    /// Registered username, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Ed25519 public key, hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ed25519_pub: Option<String>,
    /// Messaging (X25519) public key, hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_pub: Option<String>,
    /// Ring signature public key, hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring_pub: Option<String>,
    /// Published stealth keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stealth: Option<StealthPublic>,
    /// Dead-man-switch config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dms: Option<DeadManSwitch>,
    /// Per-wallet mining history, capped
    #[serde(default)]
    pub mining_history: Vec<MiningRecord>,
    /// Legacy address this wallet was migrated from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_from: Option<String>,
}

impl Wallet {
    /// Fresh wallet with zero balance at level 0
    pub fn new(key_id: String, created_at: u64) -> Self {
        Self {
            balance: 0.0,
            level: 0,
            key_id,
            created_at,
            tx_count: 0,
            msg_count: 0,
            last_activity: created_at,
            username: None,
            ed25519_pub: None,
            messaging_pub: None,
            ring_pub: None,
            stealth: None,
            dms: None,
            mining_history: Vec::new(),
            migrated_from: None,
        }
    }

    /// Record a mining win, keeping the history capped
    pub fn record_win(&mut self, block: u64, reward: f64, timestamp: u64) {
        self.mining_history.push(MiningRecord {
            block,
            reward,
            timestamp,
        });
        if self.mining_history.len() > MAX_MINING_HISTORY {
            let excess = self.mining_history.len() - MAX_MINING_HISTORY;
            self.mining_history.drain(..excess);
        }
    }

    /// Touch activity bookkeeping after a sent or received transaction
    pub fn touch(&mut self, now: u64) {
        self.tx_count += 1;
        self.last_activity = now;
    }
}
