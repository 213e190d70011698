//! End-to-end flows for the public transfer, VEIL and STASH paths,
//! driven through the real block producer.

use std::sync::Arc;

use lac::consensus::{MiningCoordinator, Poet};
use lac::node::{BlockProducer, NullHooks, ProducerConfig};
use lac::privacy;
use lac::state::{StateStore, Transaction};
use lac::zero_history::{ZeroHistoryConfig, ZeroHistoryManager};
use tempfile::tempdir;

const SEED_A: &str = "integration seed alice 123456789";
const SEED_B: &str = "integration seed bob 12345678901";
const SEED_MINER: &str = "integration seed miner 123456789";

fn node_under_test(dir: &std::path::Path) -> (Arc<StateStore>, BlockProducer) {
    let store = Arc::new(StateStore::open(dir, 1_000).unwrap());
    let producer = BlockProducer::new(
        store.clone(),
        MiningCoordinator::new(Poet::new(1, 1.0, 0.0)),
        ZeroHistoryManager::new(ZeroHistoryConfig::dev()),
        ProducerConfig::default(),
        Arc::new(NullHooks),
    );
    // bystander wallets so VEIL rings have organic decoys
    for i in 0..12 {
        store
            .register_wallet(&format!("integration bystander {i:02} xxxxx"), 1_000)
            .unwrap();
    }
    (store, producer)
}

#[test]
fn faucet_then_public_transfer() {
    let dir = tempdir().unwrap();
    let (store, mut producer) = node_under_test(dir.path());

    let (a, _) = store.register_wallet(SEED_A, 1_000).unwrap();
    let (b, _) = store.register_wallet(SEED_B, 1_000).unwrap();
    store.register_wallet(SEED_MINER, 1_000).unwrap();
    store.faucet(SEED_MINER, 100.0, 1_000).unwrap();
    store.login(SEED_MINER, 1_000).unwrap();

    store.faucet(SEED_A, 30.0, 1_001).unwrap();
    store.transfer(SEED_A, &b, 10.0, 1_002).unwrap();

    let block = producer.produce_once(2_000).unwrap().expect("block");

    let guard = store.lock();
    assert!((guard.wallets[&a].balance - 19.9).abs() < 1e-9);
    assert!((guard.wallets[&b].balance - 10.0).abs() < 1e-9);
    let transfers = block
        .transactions
        .iter()
        .filter(|tx| matches!(tx, Transaction::Transfer { .. }))
        .count();
    assert_eq!(transfers, 1);
    guard.audit().unwrap();
}

#[test]
fn veil_transfer_with_double_spend_attempt() {
    let dir = tempdir().unwrap();
    let (store, mut producer) = node_under_test(dir.path());

    let (a, _) = store.register_wallet(SEED_A, 1_000).unwrap();
    let (b, _) = store.register_wallet(SEED_B, 1_000).unwrap();
    store.register_wallet(SEED_MINER, 1_000).unwrap();
    store.faucet(SEED_MINER, 100.0, 1_000).unwrap();
    store.login(SEED_MINER, 1_000).unwrap();
    store.faucet(SEED_A, 100.0, 1_001).unwrap();

    let (receipt, images_before) = {
        let mut guard = store.lock();
        let images_before = guard.spent_key_images.len();
        let receipt = privacy::veil_transfer(&mut guard, SEED_A, &b, 10.0, 1_500).unwrap();
        (receipt, images_before)
    };

    {
        let guard = store.lock();
        assert!((guard.wallets[&a].balance - 89.0).abs() < 1e-9);
        assert!((guard.wallets[&b].balance - 10.0).abs() < 1e-9);
        assert!(receipt.phantoms >= 4 && receipt.phantoms <= 10);
        assert_eq!(
            guard.spent_key_images.len(),
            images_before + 1 + receipt.phantoms
        );
    }

    // mine the block holding the real + phantom transactions
    let block = producer.produce_once(2_000).unwrap().expect("block");
    let veil_count = block
        .transactions
        .iter()
        .filter(|tx| matches!(tx, Transaction::VeilTransfer { .. }))
        .count();
    assert_eq!(veil_count, 1 + receipt.phantoms);

    // byte-for-byte replay of the real transaction is a double spend
    let guard = store.lock();
    let replayed = block
        .transactions
        .iter()
        .find(|tx| tx.key_image() == Some(receipt.key_image.as_str()))
        .cloned()
        .unwrap();
    let err = privacy::validate_veil_transaction(&guard, &replayed).unwrap_err();
    assert_eq!(err.to_string(), "Double-spend rejected");
    // balances untouched by the rejected replay
    assert!((guard.wallets[&a].balance - 89.0).abs() < 1e-9);
    assert!((guard.wallets[&b].balance - 10.0).abs() < 1e-9);
    guard.audit().unwrap();
}

#[test]
fn stash_deposit_withdraw_lifecycle() {
    let dir = tempdir().unwrap();
    let (store, mut producer) = node_under_test(dir.path());

    let (a, _) = store.register_wallet(SEED_A, 1_000).unwrap();
    let (b, _) = store.register_wallet(SEED_B, 1_000).unwrap();
    store.register_wallet(SEED_MINER, 1_000).unwrap();
    store.faucet(SEED_MINER, 100.0, 1_000).unwrap();
    store.login(SEED_MINER, 1_000).unwrap();
    store.faucet(SEED_A, 102.0, 1_001).unwrap();

    let deposit = {
        let mut guard = store.lock();
        privacy::deposit(&mut guard, SEED_A, 0, 1_500).unwrap()
    };
    assert!(deposit.stash_key.starts_with("STASH-100-"));

    {
        let guard = store.lock();
        assert!(guard.wallets[&a].balance.abs() < 1e-9);
        assert!((guard.stash_pool.total_balance - 100.0).abs() < 1e-9);
        assert_eq!(guard.stash_pool.deposits.len(), 1);
        guard.audit().unwrap();
    }
    producer.produce_once(2_000).unwrap().expect("deposit block");

    let withdrawal = {
        let mut guard = store.lock();
        privacy::withdraw(&mut guard, SEED_B, &deposit.stash_key, 2_500).unwrap()
    };
    assert!((withdrawal.amount - 100.0).abs() < 1e-9);

    {
        let guard = store.lock();
        assert!((guard.wallets[&b].balance - 100.0).abs() < 1e-9);
        assert!(guard.stash_pool.total_balance.abs() < 1e-9);
        assert_eq!(guard.stash_pool.spent_nullifiers.len(), 1);
        guard.audit().unwrap();
    }
    producer.produce_once(3_000).unwrap().expect("withdraw block");

    // replaying the key is rejected with the spent-key error
    let mut guard = store.lock();
    let err = privacy::withdraw(&mut guard, SEED_B, &deposit.stash_key, 3_500).unwrap_err();
    assert_eq!(err.to_string(), "STASH key already spent");
}

#[test]
fn veil_public_fields_stay_anonymous_on_chain() {
    let dir = tempdir().unwrap();
    let (store, mut producer) = node_under_test(dir.path());

    let (a, _) = store.register_wallet(SEED_A, 1_000).unwrap();
    let (b, _) = store.register_wallet(SEED_B, 1_000).unwrap();
    store.register_wallet(SEED_MINER, 1_000).unwrap();
    store.faucet(SEED_MINER, 100.0, 1_000).unwrap();
    store.login(SEED_MINER, 1_000).unwrap();
    store.faucet(SEED_A, 50.0, 1_001).unwrap();

    {
        let mut guard = store.lock();
        privacy::veil_transfer(&mut guard, SEED_A, &b, 5.0, 1_500).unwrap();
    }
    let block = producer.produce_once(2_000).unwrap().expect("block");

    for tx in &block.transactions {
        if let Transaction::VeilTransfer {
            from, to, amount, ..
        } = tx
        {
            assert_eq!(from, "anonymous");
            assert_eq!(*amount, 0.0);
            assert_ne!(to, &a);
            assert_ne!(to, &b);
        }
    }
}
