//! STASH shielded pool
//!
//! Deposits lock one of four fixed nominals into the pool and hand the
//! user an opaque key (`STASH-<amount>-<secret>`), shown exactly once.
//! Withdrawal presents the key anywhere, any time: the node recomputes
//! the nullifier and pays out if it has never been spent. The on-chain
//! records name only `stash_pool` and one-time hints.

use lac_state::store::StateStore;
use lac_state::{LedgerState, StateError, Transaction};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::errors::{PrivacyError, PrivacyResult};

/// Fixed deposit fee, LAC. Withdrawals are free.
pub const STASH_FEE: f64 = 2.0;

const NULLIFIER_DOMAIN: &[u8] = b"STASH_NULL";
const NOMINALS: [f64; 4] = [100.0, 1_000.0, 10_000.0, 100_000.0];

/// Nominal amount for a code, if the code is valid
pub fn nominal_amount(code: u8) -> Option<f64> {
    NOMINALS.get(code as usize).copied()
}

fn nominal_code_for(amount: f64) -> Option<u8> {
    NOMINALS
        .iter()
        .position(|n| (*n - amount).abs() < 1e-9)
        .map(|i| i as u8)
}

/// A parsed STASH key
#[derive(Debug, Clone, PartialEq)]
pub struct StashKey {
    /// Nominal amount, LAC
    pub amount: f64,
    /// Nominal code 0..=3
    pub nominal_code: u8,
    /// 32-byte secret
    pub secret: Vec<u8>,
}

#[derive(Deserialize)]
struct LegacyKeyPayload {
    #[allow(dead_code)]
    v: u8,
    n: u8,
    s: String,
}

impl StashKey {
    /// Render the current key format: `STASH-<amount>-<secret_hex>`
    pub fn format(&self) -> String {
        format!("STASH-{}-{}", self.amount as u64, hex::encode(&self.secret))
    }

    /// Parse either the current `STASH-…` format or the legacy
    /// `stash_{"v":1,"n":<code>,"s":"<hex>"}` form.
    pub fn parse(key: &str) -> PrivacyResult<Self> {
        let key = key.trim();
        if let Some(rest) = key.strip_prefix("STASH-") {
            let (amount_str, secret_hex) = rest
                .split_once('-')
                .ok_or_else(|| PrivacyError::InvalidStashKey("missing secret".into()))?;
            let amount: f64 = amount_str
                .parse::<u64>()
                .map_err(|_| PrivacyError::InvalidStashKey("bad amount".into()))?
                as f64;
            let nominal_code = nominal_code_for(amount)
                .ok_or_else(|| PrivacyError::InvalidStashKey(format!("unknown nominal {amount}")))?;
            let secret = hex::decode(secret_hex)
                .map_err(|_| PrivacyError::InvalidStashKey("bad secret hex".into()))?;
            if secret.len() != 32 {
                return Err(PrivacyError::InvalidStashKey("secret must be 32 bytes".into()));
            }
            return Ok(Self {
                amount,
                nominal_code,
                secret,
            });
        }
        if let Some(payload) = key.strip_prefix("stash_") {
            let parsed: LegacyKeyPayload = serde_json::from_str(payload)
                .map_err(|_| PrivacyError::InvalidStashKey("malformed legacy key".into()))?;
            let amount =
                nominal_amount(parsed.n).ok_or(PrivacyError::UnknownNominal(parsed.n))?;
            let secret = hex::decode(&parsed.s)
                .map_err(|_| PrivacyError::InvalidStashKey("bad secret hex".into()))?;
            if secret.len() != 32 {
                return Err(PrivacyError::InvalidStashKey("secret must be 32 bytes".into()));
            }
            return Ok(Self {
                amount,
                nominal_code: parsed.n,
                secret,
            });
        }
        Err(PrivacyError::InvalidStashKey(
            "use STASH-amount-key or legacy stash_{} format".into(),
        ))
    }

    /// The nullifier published on withdrawal
    pub fn nullifier(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(NULLIFIER_DOMAIN);
        hasher.update(&self.secret);
        hex::encode(hasher.finalize())
    }

    /// Hash of the nullifier, keying the deposit entry
    pub fn nullifier_hash(&self) -> String {
        hex::encode(Sha256::digest(self.nullifier().as_bytes()))
    }
}

/// Result of a deposit. The key is returned exactly once and is not
/// recoverable.
#[derive(Debug, Clone)]
pub struct DepositReceipt {
    /// The opaque key, shown to the user once
    pub stash_key: String,
    /// Nominal locked
    pub amount: f64,
    /// Fee charged
    pub fee: f64,
    /// Nominal code
    pub nominal_code: u8,
}

/// Result of a withdrawal
#[derive(Debug, Clone)]
pub struct WithdrawReceipt {
    /// Nominal recovered
    pub amount: f64,
    /// Recipient balance after credit
    pub balance: f64,
}

/// Deposit a fixed nominal into the pool.
pub fn deposit(
    ledger: &mut LedgerState,
    seed: &str,
    nominal_code: u8,
    now: u64,
) -> PrivacyResult<DepositReceipt> {
    let amount = nominal_amount(nominal_code).ok_or(PrivacyError::UnknownNominal(nominal_code))?;

    let from = StateStore::address_for_seed(ledger, seed);
    if !ledger.wallets.contains_key(&from) {
        return Err(StateError::WalletNotFound(from).into());
    }

    let needed = amount + STASH_FEE;
    let have = ledger.wallets[&from].balance;
    if have < needed {
        return Err(StateError::InsufficientBalance { need: needed, have }.into());
    }

    let mut secret = [0u8; 32];
    getrandom::getrandom(&mut secret)
        .map_err(|e| PrivacyError::Crypto(lac_crypto::CryptoError::Entropy(e.to_string())))?;
    let key = StashKey {
        amount,
        nominal_code,
        secret: secret.to_vec(),
    };
    let nullifier_hash = key.nullifier_hash();

    ledger.mempool.push(Transaction::StashDeposit {
        from: "anonymous".to_string(),
        to: "stash_pool".to_string(),
        amount,
        fee: STASH_FEE,
        nominal_code,
        nullifier_hash: nullifier_hash.clone(),
        real_from: Some(from.clone()),
        timestamp: now,
    });

    if let Some(wallet) = ledger.wallets.get_mut(&from) {
        wallet.balance -= needed;
        wallet.touch(now);
    }
    ledger.counters.burned_fees += STASH_FEE;
    ledger.stash_pool.deposit(nullifier_hash, amount, nominal_code, now);

    Ok(DepositReceipt {
        stash_key: key.format(),
        amount,
        fee: STASH_FEE,
        nominal_code,
    })
}

/// Redeem a STASH key into the seed's wallet. Free of fee; rejects spent
/// nullifiers and withdrawals the pool cannot cover.
pub fn withdraw(
    ledger: &mut LedgerState,
    seed: &str,
    stash_key: &str,
    now: u64,
) -> PrivacyResult<WithdrawReceipt> {
    let key = StashKey::parse(stash_key)?;
    let nullifier = key.nullifier();

    let to = StateStore::address_for_seed(ledger, seed);
    if !ledger.wallets.contains_key(&to) {
        return Err(StateError::WalletNotFound(to).into());
    }

    // Atomic pool update: spent check, balance check, nullifier append,
    // deposit entry consumed.
    ledger
        .stash_pool
        .withdraw(&nullifier, &key.nullifier_hash(), key.amount)?;

    let mut hint_entropy = [0u8; 32];
    getrandom::getrandom(&mut hint_entropy)
        .map_err(|e| PrivacyError::Crypto(lac_crypto::CryptoError::Entropy(e.to_string())))?;
    let hint = format!("stash_{}", &hex::encode(Sha256::digest(hint_entropy))[..32]);

    ledger.mempool.push(Transaction::StashWithdraw {
        from: "stash_pool".to_string(),
        to: hint,
        amount: key.amount,
        fee: 0.0,
        nominal_code: key.nominal_code,
        nullifier,
        real_to: Some(to.clone()),
        timestamp: now,
    });

    let wallet = ledger
        .wallets
        .get_mut(&to)
        .ok_or_else(|| StateError::WalletNotFound(to.clone()))?;
    wallet.balance += key.amount;
    wallet.touch(now);
    let balance = wallet.balance;

    Ok(WithdrawReceipt {
        amount: key.amount,
        balance,
    })
}
