//! VEIL transfers
//!
//! A VEIL transfer moves value from `real_from` to `real_to` without
//! revealing either on chain. The on-wire transaction shows
//! `from = "anonymous"`, a one-time address, and amount 0; the ring
//! signature's key image is the only spend evidence. Every real transfer
//! is accompanied by 4–10 phantoms signed with throwaway keys, so an
//! observer sees `1 + P` structurally identical transactions and cannot
//! tell which moved value.

use lac_crypto::ring::{self, RingKeypair};
use lac_crypto::stealth;
use lac_state::store::StateStore;
use lac_state::{LedgerState, StateError, Transaction};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{PrivacyError, PrivacyResult};

/// Fee on every VEIL transfer, LAC
pub const VEIL_FEE: f64 = 1.0;
/// Minimum phantoms per real transfer
pub const PHANTOM_MIN: usize = 4;
/// Maximum phantoms per real transfer
pub const PHANTOM_MAX: usize = 10;

/// What the caller gets back after a VEIL transfer
#[derive(Debug, Clone)]
pub struct VeilReceipt {
    /// Real transaction id
    pub tx_id: String,
    /// One-time address the value went to
    pub ota: String,
    /// Key image recorded for the spend
    pub key_image: String,
    /// Ring size of the real transaction
    pub ring_size: usize,
    /// Number of phantoms emitted
    pub phantoms: usize,
    /// Real + phantom transaction count
    pub total_txs: usize,
    /// Sender balance after the transfer
    pub balance: f64,
}

fn ring_message(key_image: &str, ota: &str, timestamp: u64) -> Vec<u8> {
    serde_json::to_vec(&json!({"ki": key_image, "ota": ota, "ts": timestamp})).unwrap_or_default()
}

fn fresh_utxo_id(amount: f64) -> PrivacyResult<Vec<u8>> {
    let mut entropy = [0u8; 16];
    getrandom::getrandom(&mut entropy)
        .map_err(|e| PrivacyError::Crypto(lac_crypto::CryptoError::Entropy(e.to_string())))?;
    let mut utxo = entropy.to_vec();
    utxo.extend_from_slice(&amount.to_le_bytes());
    Ok(utxo)
}

fn ring_candidates(ledger: &LedgerState, exclude: &[&str]) -> Vec<String> {
    ledger
        .wallets
        .iter()
        .filter(|(addr, _)| !exclude.contains(&addr.as_str()))
        .filter_map(|(_, w)| w.ring_pub.clone())
        .collect()
}

fn build_veil_tx(
    seed: &str,
    ota: String,
    ephemeral: String,
    utxo_id: &[u8],
    candidates: &[String],
    payload_hash: String,
    real: Option<(String, String, f64)>,
    now: u64,
) -> PrivacyResult<(Transaction, String)> {
    let signer_pub = RingKeypair::from_seed(seed).public_hex();
    let (ring_members, signer_index) = ring::select_ring(candidates, &signer_pub)?;
    let key_image = ring::key_image(seed, utxo_id);
    let message = ring_message(&key_image, &ota, now);
    let signature = ring::sign(seed, &message, &ring_members, signer_index, utxo_id)?;

    let mut tx_entropy = [0u8; 8];
    getrandom::getrandom(&mut tx_entropy)
        .map_err(|e| PrivacyError::Crypto(lac_crypto::CryptoError::Entropy(e.to_string())))?;
    let tag = real.as_ref().map(|_| "veil").unwrap_or("veil_phantom");
    let tx_id = hex::encode(Sha256::digest(
        format!("{tag}_{now}_{}", hex::encode(tx_entropy)).as_bytes(),
    ));

    let (real_from, real_to, real_amount) = match real {
        Some((from, to, amount)) => (Some(from), Some(to), Some(amount)),
        None => (None, None, None),
    };

    let tx = Transaction::VeilTransfer {
        tx_id: tx_id.clone(),
        from: "anonymous".to_string(),
        to: ota,
        amount: 0.0,
        fee: VEIL_FEE,
        real_from,
        real_to,
        real_amount,
        ephemeral,
        payload_hash,
        ring_signature: signature,
        timestamp: now,
        anonymous: true,
    };
    Ok((tx, tx_id))
}

/// Execute a VEIL transfer inside the caller's critical section.
///
/// Debits `amount + fee` from the sender, credits the recipient, records
/// the real and phantom key images, and queues `1 + P` shuffled
/// transactions for the next block.
pub fn veil_transfer(
    ledger: &mut LedgerState,
    seed: &str,
    recipient: &str,
    amount: f64,
    now: u64,
) -> PrivacyResult<VeilReceipt> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(StateError::InvalidAmount(amount).into());
    }

    let from = StateStore::address_for_seed(ledger, seed);
    if !ledger.wallets.contains_key(&from) {
        return Err(StateError::WalletNotFound(from).into());
    }
    let to = ledger
        .resolve_recipient(recipient)
        .ok_or_else(|| StateError::UnknownRecipient(recipient.to_string()))?;

    let needed = amount + VEIL_FEE;
    let have = ledger.wallets[&from].balance;
    if have < needed {
        return Err(StateError::InsufficientBalance { need: needed, have }.into());
    }

    // One-time address toward the recipient's published stealth keys
    let recipient_stealth = ledger.wallets[&to]
        .stealth
        .clone()
        .ok_or_else(|| StateError::UnknownRecipient(format!("{to} has no stealth keys")))?;
    let ota = stealth::generate_one_time_address(&recipient_stealth.scan, &recipient_stealth.spend)?;

    // Key image bound to this output; a reused image is a double spend
    let utxo_id = fresh_utxo_id(amount)?;
    let key_image = ring::key_image(seed, &utxo_id);
    if ledger.spent_key_images.contains(&key_image) {
        return Err(PrivacyError::DoubleSpend);
    }

    let candidates = ring_candidates(ledger, &[from.as_str(), to.as_str()]);

    let payload_hash = hex::encode(Sha256::digest(
        serde_json::to_vec(&json!({"to": to, "amount": amount, "ts": now})).unwrap_or_default(),
    ));

    let (real_tx, tx_id) = build_veil_tx(
        seed,
        ota.address.clone(),
        ota.ephemeral_public.clone(),
        &utxo_id,
        &candidates,
        payload_hash,
        Some((from.clone(), to.clone(), amount)),
        now,
    )?;
    let ring_size = real_tx.ring_signature().map(|s| s.ring.len()).unwrap_or(0);

    // Phantoms: throwaway keys, fresh rings, no real_* fields
    let mut rng = rand::thread_rng();
    let phantom_count = rng.gen_range(PHANTOM_MIN..=PHANTOM_MAX);
    let phantom_pool = ring_candidates(ledger, &[]);
    let mut all_txs = vec![real_tx];

    for _ in 0..phantom_count {
        let mut throwaway = [0u8; 32];
        getrandom::getrandom(&mut throwaway)
            .map_err(|e| PrivacyError::Crypto(lac_crypto::CryptoError::Entropy(e.to_string())))?;
        let phantom_seed = format!("phantom:{}", hex::encode(throwaway));

        let phantom_stealth = lac_crypto::StealthKeys::from_seed(&phantom_seed).public();
        let phantom_ota =
            stealth::generate_one_time_address(&phantom_stealth.scan, &phantom_stealth.spend)?;
        let phantom_utxo = fresh_utxo_id(0.0)?;
        let phantom_payload = hex::encode(Sha256::digest(&phantom_utxo));

        let (phantom_tx, _) = build_veil_tx(
            &phantom_seed,
            phantom_ota.address,
            phantom_ota.ephemeral_public,
            &phantom_utxo,
            &phantom_pool,
            phantom_payload,
            None,
            now,
        )?;
        if let Some(image) = phantom_tx.key_image() {
            // Phantom images can never be reused either
            ledger.insert_key_image(image)?;
        }
        all_txs.push(phantom_tx);
    }

    all_txs.shuffle(&mut rng);
    let evicted = ledger.mempool.extend(all_txs);
    if !evicted.is_empty() {
        debug!("mempool overflow during veil transfer, dropped {}", evicted.len());
    }

    // Balance moves for the real transfer only
    if let Some(sender) = ledger.wallets.get_mut(&from) {
        sender.balance -= needed;
        sender.touch(now);
    }
    ledger.counters.burned_fees += VEIL_FEE;
    if let Some(receiver) = ledger.wallets.get_mut(&to) {
        receiver.balance += amount;
        receiver.touch(now);
    }
    ledger.insert_key_image(&key_image)?;

    let balance = ledger.wallets[&from].balance;
    debug!(
        "veil transfer: 1 real + {phantom_count} phantoms, ring {ring_size}, key image {}",
        &key_image[..16]
    );

    Ok(VeilReceipt {
        tx_id,
        ota: ota.address,
        key_image,
        ring_size,
        phantoms: phantom_count,
        total_txs: phantom_count + 1,
        balance,
    })
}

/// Validate an incoming VEIL transaction (peer block or replay): the
/// ring signature must verify and the key image must be unseen.
pub fn validate_veil_transaction(ledger: &LedgerState, tx: &Transaction) -> PrivacyResult<()> {
    let Transaction::VeilTransfer {
        to,
        ring_signature,
        timestamp,
        ..
    } = tx
    else {
        return Ok(());
    };

    let message = ring_message(&ring_signature.key_image, to, *timestamp);
    if !ring::verify(ring_signature, &message) {
        return Err(PrivacyError::InvalidRingSignature);
    }
    if ledger.spent_key_images.contains(&ring_signature.key_image) {
        return Err(PrivacyError::DoubleSpend);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lac_state::store::StateStore;
    use tempfile::tempdir;

    const SENDER: &str = "veil sender seed 123456789012345";
    const RECIPIENT: &str = "veil recipient seed 12345678901";

    fn store_with_funded_sender(balance: f64) -> (tempfile::TempDir, StateStore, String, String) {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path(), 1_000).unwrap();
        let (a, _) = store.register_wallet(SENDER, 1_000).unwrap();
        let (b, _) = store.register_wallet(RECIPIENT, 1_000).unwrap();
        // a few bystanders so rings have organic decoys
        for i in 0..12 {
            store
                .register_wallet(&format!("bystander seed number {i:02} xxxxxx"), 1_000)
                .unwrap();
        }
        store.faucet(SENDER, balance, 1_000).unwrap();
        (dir, store, a, b)
    }

    #[test]
    fn test_veil_transfer_moves_value_invisibly() {
        let (_dir, store, a, b) = store_with_funded_sender(100.0);
        let mut guard = store.lock();
        let images_before = guard.spent_key_images.len();
        let mempool_before = guard.mempool.len();

        let receipt = veil_transfer(&mut guard, SENDER, &b, 10.0, 2_000).unwrap();

        assert!((guard.wallets[&a].balance - 89.0).abs() < 1e-9);
        assert!((guard.wallets[&b].balance - 10.0).abs() < 1e-9);
        assert!(receipt.phantoms >= PHANTOM_MIN && receipt.phantoms <= PHANTOM_MAX);
        assert_eq!(
            guard.spent_key_images.len(),
            images_before + 1 + receipt.phantoms
        );
        assert_eq!(guard.mempool.len(), mempool_before + 1 + receipt.phantoms);
        assert!(receipt.ring_size >= 7 && receipt.ring_size <= 15);
        guard.audit().unwrap();
    }

    #[test]
    fn test_public_fields_leak_nothing() {
        let (_dir, store, a, b) = store_with_funded_sender(100.0);
        let mut guard = store.lock();
        veil_transfer(&mut guard, SENDER, &b, 10.0, 2_000).unwrap();

        for tx in guard.mempool.iter() {
            if let Transaction::VeilTransfer { from, to, amount, .. } = tx {
                assert_eq!(from, "anonymous");
                assert_eq!(*amount, 0.0);
                assert_ne!(to, &a);
                assert_ne!(to, &b);
            }
        }
    }

    #[test]
    fn test_phantoms_carry_no_real_fields_and_verify() {
        let (_dir, store, _a, b) = store_with_funded_sender(100.0);
        let mut guard = store.lock();
        veil_transfer(&mut guard, SENDER, &b, 10.0, 2_000).unwrap();

        let mut real = 0;
        let mut phantom = 0;
        let txs: Vec<Transaction> = guard.mempool.iter().cloned().collect();
        for tx in &txs {
            if let Transaction::VeilTransfer { real_from, .. } = tx {
                if real_from.is_some() {
                    real += 1;
                } else {
                    phantom += 1;
                }
                // both kinds are structurally valid ring signatures
                let sig = tx.ring_signature().unwrap();
                let message = ring_message(&sig.key_image, match tx {
                    Transaction::VeilTransfer { to, .. } => to,
                    _ => unreachable!(),
                }, tx.timestamp());
                assert!(ring::verify(sig, &message));
            }
        }
        assert_eq!(real, 1);
        assert!(phantom >= PHANTOM_MIN);
    }

    #[test]
    fn test_insufficient_balance_rejected() {
        let (_dir, store, a, b) = store_with_funded_sender(5.0);
        let mut guard = store.lock();
        let err = veil_transfer(&mut guard, SENDER, &b, 10.0, 2_000).unwrap_err();
        assert!(matches!(
            err,
            PrivacyError::State(StateError::InsufficientBalance { .. })
        ));
        assert!((guard.wallets[&a].balance - 5.0).abs() < 1e-9);
        assert!(guard.mempool.is_empty());
    }

    #[test]
    fn test_replayed_transaction_rejected_as_double_spend() {
        let (_dir, store, _a, b) = store_with_funded_sender(100.0);
        let mut guard = store.lock();
        veil_transfer(&mut guard, SENDER, &b, 10.0, 2_000).unwrap();

        let replayed = guard
            .mempool
            .iter()
            .find(|tx| matches!(tx, Transaction::VeilTransfer { real_from: Some(_), .. }))
            .cloned()
            .unwrap();
        let err = validate_veil_transaction(&guard, &replayed).unwrap_err();
        assert!(matches!(err, PrivacyError::DoubleSpend));
    }

    #[test]
    fn test_fresh_veil_transaction_validates() {
        let (_dir, store, _a, b) = store_with_funded_sender(100.0);
        let mut guard = store.lock();
        veil_transfer(&mut guard, SENDER, &b, 10.0, 2_000).unwrap();

        let tx = guard
            .mempool
            .iter()
            .find(|tx| matches!(tx, Transaction::VeilTransfer { .. }))
            .cloned()
            .unwrap();
        // an unseen copy (fresh ledger) validates
        let fresh_dir = tempdir().unwrap();
        let fresh = StateStore::open(fresh_dir.path(), 1_000).unwrap();
        let fresh_guard = fresh.lock();
        validate_veil_transaction(&fresh_guard, &tx).unwrap();
    }
}
