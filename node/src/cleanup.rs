//! Periodic cleanup
//!
//! Every ~60 seconds: drop ephemeral messages and stale group posts
//! past five minutes, sessions idle past a day, reactions past a week,
//! and evaluate dead-man-switch triggers. Mutation happens in one
//! critical section; the message/group fast-save paths run after the
//! lock is released.

use std::sync::Arc;

use lac_state::store::StateStore;
use lac_state::Transaction;
use tracing::{debug, info, warn};

/// Cleanup TTLs
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Ephemeral message lifetime, seconds
    pub ephemeral_ttl_secs: u64,
    /// Group post lifetime, seconds
    pub group_post_ttl_secs: u64,
    /// Session inactivity limit, seconds
    pub session_ttl_secs: u64,
    /// Reaction lifetime, seconds
    pub reaction_ttl_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            ephemeral_ttl_secs: 5 * 60,
            group_post_ttl_secs: 5 * 60,
            session_ttl_secs: 24 * 3600,
            reaction_ttl_secs: 7 * 24 * 3600,
        }
    }
}

/// What one cleanup pass removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub ephemeral_dropped: usize,
    pub group_posts_dropped: usize,
    pub sessions_dropped: usize,
    pub reactions_dropped: usize,
    pub dms_triggered: usize,
}

/// Reaction keys embed the message timestamp as `<ts>:<msg_id>`
fn reaction_timestamp(key: &str) -> Option<u64> {
    key.split_once(':').and_then(|(ts, _)| ts.parse().ok())
}

/// One cleanup pass over the store
pub fn run_cleanup_once(store: &StateStore, config: &CleanupConfig, now: u64) -> CleanupStats {
    let mut stats = CleanupStats::default();

    {
        let mut guard = store.lock();

        let ephemeral_cutoff = now.saturating_sub(config.ephemeral_ttl_secs);
        let before = guard.ephemeral_msgs.len();
        guard.ephemeral_msgs.retain(|m| m.timestamp >= ephemeral_cutoff);
        stats.ephemeral_dropped = before - guard.ephemeral_msgs.len();

        let post_cutoff = now.saturating_sub(config.group_post_ttl_secs);
        for group in guard.groups.values_mut() {
            stats.group_posts_dropped += group.prune_posts(post_cutoff);
        }

        let session_cutoff = now.saturating_sub(config.session_ttl_secs);
        let before = guard.sessions.len();
        guard.sessions.retain(|_, last| *last >= session_cutoff);
        stats.sessions_dropped = before - guard.sessions.len();

        let reaction_cutoff = now.saturating_sub(config.reaction_ttl_secs);
        let before = guard.reactions.len();
        guard
            .reactions
            .retain(|key, _| match reaction_timestamp(key) {
                Some(ts) => ts >= reaction_cutoff,
                None => true,
            });
        stats.reactions_dropped = before - guard.reactions.len();

        stats.dms_triggered = evaluate_dead_man_switches(&mut guard, now);
    }

    if stats != CleanupStats::default() {
        debug!(
            "cleanup: {} msgs, {} posts, {} sessions, {} reactions, {} dms",
            stats.ephemeral_dropped,
            stats.group_posts_dropped,
            stats.sessions_dropped,
            stats.reactions_dropped,
            stats.dms_triggered
        );
        if let Err(e) = store.save_messages(now) {
            warn!("message save after cleanup failed: {e}");
        }
        if let Err(e) = store.save_groups(now) {
            warn!("group save after cleanup failed: {e}");
        }
    }

    stats
}

/// Fire dead-man switches whose owners went silent past their timeout:
/// the balance moves to the beneficiary and a `dms_trigger` transaction
/// rides in the next block.
fn evaluate_dead_man_switches(ledger: &mut lac_state::LedgerState, now: u64) -> usize {
    let due: Vec<(String, String, f64)> = ledger
        .wallets
        .iter()
        .filter_map(|(addr, wallet)| {
            let dms = wallet.dms.as_ref()?;
            let silent_for = now.saturating_sub(dms.last_checkin);
            (silent_for > dms.timeout_secs && ledger.wallets.contains_key(&dms.beneficiary))
                .then(|| (addr.clone(), dms.beneficiary.clone(), wallet.balance))
        })
        .collect();

    let triggered = due.len();
    for (owner, beneficiary, amount) in due {
        if let Some(wallet) = ledger.wallets.get_mut(&owner) {
            wallet.balance = 0.0;
            wallet.dms = None;
        }
        if let Some(wallet) = ledger.wallets.get_mut(&beneficiary) {
            wallet.balance += amount;
        }
        ledger.pending_txs.push(Transaction::DmsTrigger {
            from: owner.clone(),
            to: beneficiary.clone(),
            amount,
            timestamp: now,
        });
        info!("dead-man switch fired: {owner} -> {beneficiary} ({amount} LAC)");
    }
    triggered
}

/// The 60-second cleanup loop
pub async fn cleanup_loop(store: Arc<StateStore>, config: CleanupConfig, interval_secs: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        run_cleanup_once(&store, &config, crate::now_secs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lac_crypto::EncryptedMessage;
    use lac_state::account::DeadManSwitch;
    use lac_state::EphemeralMessage;
    use tempfile::tempdir;

    const OWNER: &str = "dms owner seed 12345678901234567";
    const HEIR: &str = "dms heir seed 123456789012345678";

    fn envelope() -> EncryptedMessage {
        EncryptedMessage {
            cipher: "x25519-xchacha20-poly1305".into(),
            data: "00".into(),
            nonce: "00".repeat(24),
            sender_pubkey: "00".into(),
        }
    }

    #[test]
    fn test_ephemeral_expiry() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path(), 1_000).unwrap();
        {
            let mut guard = store.lock();
            guard.ephemeral_msgs.push(EphemeralMessage {
                to: "lac1a".into(),
                envelope: envelope(),
                timestamp: 1_000,
            });
            guard.ephemeral_msgs.push(EphemeralMessage {
                to: "lac1b".into(),
                envelope: envelope(),
                timestamp: 1_350,
            });
        }

        let stats = run_cleanup_once(&store, &CleanupConfig::default(), 1_400);
        assert_eq!(stats.ephemeral_dropped, 1);
        assert_eq!(store.lock().ephemeral_msgs.len(), 1);
    }

    #[test]
    fn test_session_expiry() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path(), 1_000).unwrap();
        {
            let mut guard = store.lock();
            guard.sessions.insert("lac1old".into(), 1_000);
            guard.sessions.insert("lac1new".into(), 90_000);
        }

        let stats = run_cleanup_once(&store, &CleanupConfig::default(), 90_000);
        assert_eq!(stats.sessions_dropped, 1);
        assert!(store.lock().sessions.contains_key("lac1new"));
    }

    #[test]
    fn test_reaction_expiry_by_key_timestamp() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path(), 1_000).unwrap();
        let week = 7 * 24 * 3600;
        {
            let mut guard = store.lock();
            guard.reactions.insert(format!("{}:msg1", 1_000), Default::default());
            guard
                .reactions
                .insert(format!("{}:msg2", week + 5_000), Default::default());
            // malformed keys are left alone
            guard.reactions.insert("unkeyed".into(), Default::default());
        }

        let stats = run_cleanup_once(&store, &CleanupConfig::default(), week + 10_000);
        assert_eq!(stats.reactions_dropped, 1);
        assert_eq!(store.lock().reactions.len(), 2);
    }

    #[test]
    fn test_dead_man_switch_fires() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path(), 1_000).unwrap();
        let (owner, _) = store.register_wallet(OWNER, 1_000).unwrap();
        let (heir, _) = store.register_wallet(HEIR, 1_000).unwrap();
        store.faucet(OWNER, 500.0, 1_000).unwrap();
        {
            let mut guard = store.lock();
            guard.wallets.get_mut(&owner).unwrap().dms = Some(DeadManSwitch {
                beneficiary: heir.clone(),
                timeout_secs: 3_600,
                last_checkin: 1_000,
            });
        }

        // not yet due
        let stats = run_cleanup_once(&store, &CleanupConfig::default(), 2_000);
        assert_eq!(stats.dms_triggered, 0);

        // past the timeout
        let stats = run_cleanup_once(&store, &CleanupConfig::default(), 10_000);
        assert_eq!(stats.dms_triggered, 1);

        let guard = store.lock();
        assert_eq!(guard.wallets[&owner].balance, 0.0);
        assert_eq!(guard.wallets[&heir].balance, 500.0);
        assert!(guard.wallets[&owner].dms.is_none());
        assert_eq!(guard.pending_txs.len(), 1);
        guard.audit().unwrap();
    }
}
