//! The state store
//!
//! One entity owns every mutable collection; one `parking_lot::Mutex`
//! guards them all. Mutators run inside a bounded critical section;
//! persistence clones a consistent snapshot under the lock and writes
//! it after release. A `Saved` event is published to subscribers after
//! each successful persist.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use lac_crypto::{MessagingKeys, RingKeypair, SigningKeys, StealthKeys};
use lac_mempool::{Mempool, PendingQueue};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::account::{address_from_seed, key_id_from_seed, legacy_address, validate_seed, Wallet};
use crate::block::Block;
use crate::errors::{StateError, StateResult};
use crate::messages::{EphemeralMessage, Group, PersistentMessage};
use crate::persist;
use crate::stash::StashPool;
use crate::transaction::Transaction;
use crate::MIN_TX_FEE;

/// Accumulated emission and burn counters. These are updated as value is
/// created or destroyed, never recalculated, and anchor the conservation
/// invariant: emitted − burned = Σ balances + stash pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    #[serde(default)]
    pub emitted_mining: f64,
    #[serde(default)]
    pub emitted_faucet: f64,
    #[serde(default)]
    pub emitted_dice: f64,
    #[serde(default)]
    pub emitted_referral: f64,
    #[serde(default)]
    pub burned_dice: f64,
    #[serde(default)]
    pub burned_levels: f64,
    #[serde(default)]
    pub burned_username: f64,
    #[serde(default)]
    pub burned_fees: f64,
    #[serde(default)]
    pub burned_dms: f64,
    #[serde(default)]
    pub burned_other: f64,
}

impl Counters {
    /// Total LAC ever emitted
    pub fn total_emitted(&self) -> f64 {
        self.emitted_mining + self.emitted_faucet + self.emitted_dice + self.emitted_referral
    }

    /// Total LAC ever burned
    pub fn total_burned(&self) -> f64 {
        self.burned_dice
            + self.burned_levels
            + self.burned_username
            + self.burned_fees
            + self.burned_dms
            + self.burned_other
    }
}

/// An invite code and its usage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralCode {
    pub creator: String,
    #[serde(default)]
    pub used_by: Vec<String>,
    pub created_at: u64,
}

/// A wallet's referral linkage. `invited_by` is set exactly once, at
/// registration, and must point to an existing wallet, so the referral
/// graph cannot contain cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralLink {
    pub invite_code: String,
    pub invited_by: String,
    #[serde(default)]
    pub boost_burned: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ReferralFile {
    codes: HashMap<String, ReferralCode>,
    map: HashMap<String, ReferralLink>,
}

/// Everything behind the lock
pub struct LedgerState {
    pub chain: Vec<Block>,
    pub wallets: HashMap<String, Wallet>,
    /// username → address
    pub usernames: HashMap<String, String>,
    pub groups: HashMap<String, Group>,
    pub ephemeral_msgs: Vec<EphemeralMessage>,
    pub persistent_msgs: Vec<PersistentMessage>,
    /// msg key → emoji → reacting addresses
    pub reactions: HashMap<String, HashMap<String, Vec<String>>>,
    pub referral_codes: HashMap<String, ReferralCode>,
    pub referral_map: HashMap<String, ReferralLink>,
    pub counters: Counters,
    pub spent_key_images: HashSet<String>,
    pub mempool: Mempool<Transaction>,
    pub pending_txs: PendingQueue<Transaction>,
    pub stash_pool: StashPool,
    /// address → last-active timestamp (logged-in miners)
    pub sessions: HashMap<String, u64>,
    /// identifier → request timestamps
    pub rate_limits: HashMap<String, Vec<u64>>,
}

impl LedgerState {
    fn empty() -> Self {
        Self {
            chain: Vec::new(),
            wallets: HashMap::new(),
            usernames: HashMap::new(),
            groups: HashMap::new(),
            ephemeral_msgs: Vec::new(),
            persistent_msgs: Vec::new(),
            reactions: HashMap::new(),
            referral_codes: HashMap::new(),
            referral_map: HashMap::new(),
            counters: Counters::default(),
            spent_key_images: HashSet::new(),
            mempool: Mempool::default(),
            pending_txs: PendingQueue::new(),
            stash_pool: StashPool::default(),
            sessions: HashMap::new(),
            rate_limits: HashMap::new(),
        }
    }

    /// Current chain height (index of the tip)
    pub fn height(&self) -> u64 {
        self.chain.last().map(|b| b.index).unwrap_or(0)
    }

    /// Hash of the tip block
    pub fn tip_hash(&self) -> String {
        self.chain
            .last()
            .map(|b| b.hash.clone())
            .unwrap_or_else(|| "0".to_string())
    }

    /// Sum of all wallet balances
    pub fn total_supply(&self) -> f64 {
        self.wallets.values().map(|w| w.balance).sum()
    }

    /// Resolve an address, legacy address or `@username` to a wallet
    /// address. Returns `None` when nothing matches.
    pub fn resolve_recipient(&self, recipient: &str) -> Option<String> {
        let recipient = recipient.trim();
        if recipient.starts_with("lac1") || recipient.starts_with("seed_") {
            return self.wallets.contains_key(recipient).then(|| recipient.to_string());
        }
        let name = recipient.trim_start_matches('@').to_lowercase();
        if let Some(addr) = self.usernames.get(&name) {
            if self.wallets.contains_key(addr) {
                return Some(addr.clone());
            }
        }
        self.wallets
            .iter()
            .find(|(_, w)| w.username.as_deref() == Some(name.as_str()))
            .map(|(addr, _)| addr.clone())
    }

    /// Record a key image; duplicate = double spend.
    pub fn insert_key_image(&mut self, key_image: &str) -> StateResult<()> {
        if !self.spent_key_images.insert(key_image.to_string()) {
            return Err(StateError::DuplicateKeyImage(key_image.to_string()));
        }
        Ok(())
    }

    /// Set a wallet's referral linkage. Only allowed once, and the
    /// inviter must already exist, so the graph stays acyclic.
    pub fn link_referral(&mut self, address: &str, invite_code: &str) -> StateResult<()> {
        if self.referral_map.contains_key(address) {
            return Err(StateError::InvalidReferral("already linked".into()));
        }
        let code = self
            .referral_codes
            .get_mut(invite_code)
            .ok_or_else(|| StateError::InvalidReferral(format!("unknown code {invite_code}")))?;
        if !self.wallets.contains_key(&code.creator) {
            return Err(StateError::InvalidReferral("inviter has no wallet".into()));
        }
        code.used_by.push(address.to_string());
        let link = ReferralLink {
            invite_code: invite_code.to_string(),
            invited_by: code.creator.clone(),
            boost_burned: false,
        };
        self.referral_map.insert(address.to_string(), link);
        Ok(())
    }

    /// Check the store invariants: non-negative balances, conservation,
    /// chain linkage, and no duplicate spent nullifiers.
    pub fn audit(&self) -> StateResult<()> {
        for (addr, wallet) in &self.wallets {
            if wallet.balance < -1e-9 {
                return Err(StateError::NegativeBalance(addr.clone()));
            }
        }

        let expected = self.counters.total_emitted() - self.counters.total_burned();
        let actual = self.total_supply() + self.stash_pool.total_balance;
        if (expected - actual).abs() > 1e-6 {
            return Err(StateError::ConservationViolated { expected, actual });
        }

        for window in self.chain.windows(2) {
            if !window[1].links_to(&window[0]) {
                return Err(StateError::ChainLinkBroken {
                    height: window[1].index,
                });
            }
        }

        let mut seen = HashSet::new();
        for nullifier in &self.stash_pool.spent_nullifiers {
            if !seen.insert(nullifier) {
                return Err(StateError::DuplicateNullifier);
            }
        }

        Ok(())
    }
}

/// Published after every successful persist
#[derive(Debug, Clone)]
pub struct SavedEvent {
    /// File names written
    pub collections: Vec<&'static str>,
    /// Persist timestamp
    pub timestamp: u64,
}

type Subscriber = Box<dyn Fn(&SavedEvent) + Send + Sync>;

/// The single in-process owner of all mutable state
pub struct StateStore {
    datadir: PathBuf,
    ledger: Mutex<LedgerState>,
    subscribers: Mutex<Vec<Subscriber>>,
}

const CHAIN_FILE: &str = "chain.json";
const WALLETS_FILE: &str = "wallets.json";
const USERNAMES_FILE: &str = "usernames.json";
const GROUPS_FILE: &str = "groups.json";
const KEY_IMAGES_FILE: &str = "key_images.json";
const STASH_FILE: &str = "stash_pool.json";
const PERSISTENT_MSGS_FILE: &str = "persistent_msgs.json";
const REFERRALS_FILE: &str = "referrals.json";
const COUNTERS_FILE: &str = "counters.json";
const REACTIONS_FILE: &str = "reactions.json";

impl StateStore {
    /// Open the store at `datadir`, loading every collection (with
    /// backup fallback) and creating the genesis block if the chain is
    /// empty.
    pub fn open(datadir: impl AsRef<Path>, now: u64) -> StateResult<Self> {
        let datadir = datadir.as_ref().to_path_buf();
        std::fs::create_dir_all(&datadir)?;

        let mut ledger = LedgerState::empty();
        ledger.chain = persist::load_with_backup(&datadir, CHAIN_FILE).unwrap_or_default();
        ledger.wallets = persist::load_with_backup(&datadir, WALLETS_FILE).unwrap_or_default();
        ledger.usernames = persist::load_with_backup(&datadir, USERNAMES_FILE).unwrap_or_default();
        ledger.groups = persist::load_with_backup(&datadir, GROUPS_FILE).unwrap_or_default();
        let images: Vec<String> =
            persist::load_with_backup(&datadir, KEY_IMAGES_FILE).unwrap_or_default();
        ledger.spent_key_images = images.into_iter().collect();
        ledger.stash_pool = persist::load_with_backup(&datadir, STASH_FILE).unwrap_or_default();
        ledger.persistent_msgs =
            persist::load_with_backup(&datadir, PERSISTENT_MSGS_FILE).unwrap_or_default();
        let referrals: ReferralFile =
            persist::load_with_backup(&datadir, REFERRALS_FILE).unwrap_or_default();
        ledger.referral_codes = referrals.codes;
        ledger.referral_map = referrals.map;
        ledger.counters = persist::load_with_backup(&datadir, COUNTERS_FILE).unwrap_or_default();
        ledger.reactions = persist::load_with_backup(&datadir, REACTIONS_FILE).unwrap_or_default();

        // Rebuild username index from wallet records
        let pairs: Vec<(String, String)> = ledger
            .wallets
            .iter()
            .filter_map(|(addr, w)| w.username.clone().map(|u| (u, addr.clone())))
            .collect();
        for (name, addr) in pairs {
            ledger.usernames.entry(name).or_insert(addr);
        }

        let store = Self {
            datadir,
            ledger: Mutex::new(ledger),
            subscribers: Mutex::new(Vec::new()),
        };

        {
            let mut guard = store.ledger.lock();
            if guard.chain.is_empty() {
                guard.chain.push(Block::genesis(now));
                info!("created genesis block");
            }
        }
        store.persist_all(now)?;

        Ok(store)
    }

    /// Acquire the global state lock for a bulk operation
    pub fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.ledger.lock()
    }

    /// Data directory this store persists into
    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    /// Subscribe to saved events
    pub fn subscribe(&self, subscriber: impl Fn(&SavedEvent) + Send + Sync + 'static) {
        self.subscribers.lock().push(Box::new(subscriber));
    }

    fn notify(&self, event: SavedEvent) {
        for subscriber in self.subscribers.lock().iter() {
            subscriber(&event);
        }
    }

    /// Persist every collection. The snapshot is taken under the lock;
    /// the writes happen after release.
    pub fn persist_all(&self, now: u64) -> StateResult<()> {
        let (chain, wallets, usernames, groups, images, stash, msgs, referrals, counters, reactions) = {
            let guard = self.ledger.lock();
            (
                guard.chain.clone(),
                guard.wallets.clone(),
                guard.usernames.clone(),
                guard.groups.clone(),
                guard.spent_key_images.iter().cloned().collect::<Vec<_>>(),
                guard.stash_pool.clone(),
                guard.persistent_msgs.clone(),
                ReferralFile {
                    codes: guard.referral_codes.clone(),
                    map: guard.referral_map.clone(),
                },
                guard.counters.clone(),
                guard.reactions.clone(),
            )
        };

        persist::save_atomic(&self.datadir, CHAIN_FILE, &chain)?;
        persist::save_atomic(&self.datadir, WALLETS_FILE, &wallets)?;
        persist::save_atomic(&self.datadir, USERNAMES_FILE, &usernames)?;
        persist::save_atomic(&self.datadir, GROUPS_FILE, &groups)?;
        persist::save_atomic(&self.datadir, KEY_IMAGES_FILE, &images)?;
        persist::save_atomic(&self.datadir, STASH_FILE, &stash)?;
        persist::save_atomic(&self.datadir, PERSISTENT_MSGS_FILE, &msgs)?;
        persist::save_atomic(&self.datadir, REFERRALS_FILE, &referrals)?;
        persist::save_atomic(&self.datadir, COUNTERS_FILE, &counters)?;
        persist::save_atomic(&self.datadir, REACTIONS_FILE, &reactions)?;

        self.notify(SavedEvent {
            collections: vec![
                CHAIN_FILE,
                WALLETS_FILE,
                USERNAMES_FILE,
                GROUPS_FILE,
                KEY_IMAGES_FILE,
                STASH_FILE,
                PERSISTENT_MSGS_FILE,
                REFERRALS_FILE,
                COUNTERS_FILE,
                REACTIONS_FILE,
            ],
            timestamp: now,
        });
        Ok(())
    }

    /// Fast path: persist only messages and reactions
    pub fn save_messages(&self, now: u64) -> StateResult<()> {
        let (msgs, reactions) = {
            let guard = self.ledger.lock();
            (guard.persistent_msgs.clone(), guard.reactions.clone())
        };
        persist::save_atomic(&self.datadir, PERSISTENT_MSGS_FILE, &msgs)?;
        persist::save_atomic(&self.datadir, REACTIONS_FILE, &reactions)?;
        self.notify(SavedEvent {
            collections: vec![PERSISTENT_MSGS_FILE, REACTIONS_FILE],
            timestamp: now,
        });
        Ok(())
    }

    /// Fast path: persist only groups
    pub fn save_groups(&self, now: u64) -> StateResult<()> {
        let groups = self.ledger.lock().groups.clone();
        persist::save_atomic(&self.datadir, GROUPS_FILE, &groups)?;
        self.notify(SavedEvent {
            collections: vec![GROUPS_FILE],
            timestamp: now,
        });
        Ok(())
    }

    /// Derive the address for a seed, migrating a legacy `seed_…` wallet
    /// (and its chain references) on first sight.
    pub fn address_for_seed(ledger: &mut LedgerState, seed: &str) -> String {
        let address = address_from_seed(seed);
        let legacy = legacy_address(seed);
        if ledger.wallets.contains_key(&legacy) && !ledger.wallets.contains_key(&address) {
            if let Some(mut wallet) = ledger.wallets.remove(&legacy) {
                wallet.migrated_from = Some(legacy.clone());
                ledger.wallets.insert(address.clone(), wallet);
                for block in &mut ledger.chain {
                    for tx in &mut block.transactions {
                        tx.migrate_address(&legacy, &address);
                    }
                }
                for addr in ledger.usernames.values_mut() {
                    if *addr == legacy {
                        *addr = address.clone();
                    }
                }
                info!("migrated legacy wallet {legacy} -> {address}");
            }
        }
        address
    }

    /// Register (or fetch) the wallet for a seed. Publishes the derived
    /// public keys so other wallets can build rings and stealth payments
    /// toward it. Returns `(address, created)`.
    pub fn register_wallet(&self, seed: &str, now: u64) -> StateResult<(String, bool)> {
        if !validate_seed(seed) {
            return Err(StateError::InvalidSeed);
        }
        let mut guard = self.ledger.lock();
        let address = Self::address_for_seed(&mut guard, seed);
        if guard.wallets.contains_key(&address) {
            return Ok((address, false));
        }
        let mut wallet = Wallet::new(key_id_from_seed(seed), now);
        wallet.ed25519_pub = Some(SigningKeys::from_seed(seed).public_hex());
        wallet.messaging_pub = Some(MessagingKeys::from_seed(seed).public_hex());
        wallet.ring_pub = Some(RingKeypair::from_seed(seed).public_hex());
        wallet.stealth = Some(StealthKeys::from_seed(seed).public());
        guard.wallets.insert(address.clone(), wallet);
        Ok((address, true))
    }

    /// Mark a wallet's session active (mining eligibility)
    pub fn login(&self, seed: &str, now: u64) -> StateResult<String> {
        if !validate_seed(seed) {
            return Err(StateError::InvalidSeed);
        }
        let mut guard = self.ledger.lock();
        let address = Self::address_for_seed(&mut guard, seed);
        if !guard.wallets.contains_key(&address) {
            return Err(StateError::WalletNotFound(address));
        }
        guard.sessions.insert(address.clone(), now);
        Ok(address)
    }

    /// Public transfer: debit sender (amount + fee), credit recipient,
    /// queue a signed `transfer` transaction for the next block.
    pub fn transfer(&self, seed: &str, recipient: &str, amount: f64, now: u64) -> StateResult<Transaction> {
        if !validate_seed(seed) {
            return Err(StateError::InvalidSeed);
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(StateError::InvalidAmount(amount));
        }
        let fee = MIN_TX_FEE;

        let mut guard = self.ledger.lock();
        let from = Self::address_for_seed(&mut guard, seed);
        if !guard.wallets.contains_key(&from) {
            return Err(StateError::WalletNotFound(from));
        }
        let to = guard
            .resolve_recipient(recipient)
            .ok_or_else(|| StateError::UnknownRecipient(recipient.to_string()))?;

        let needed = amount + fee;
        let have = guard.wallets[&from].balance;
        if have < needed {
            return Err(StateError::InsufficientBalance { need: needed, have });
        }

        let mut tx = Transaction::Transfer {
            from: from.clone(),
            to: to.clone(),
            amount,
            fee,
            timestamp: now,
            signature: None,
            pubkey: None,
        };
        let mut value = tx.to_value();
        lac_crypto::canonical::sign_transaction(seed, &mut value)?;
        if let Transaction::Transfer { signature, pubkey, .. } = &mut tx {
            *signature = value
                .get("signature")
                .and_then(|v| v.as_str())
                .map(String::from);
            *pubkey = value.get("pubkey").and_then(|v| v.as_str()).map(String::from);
        }

        if let Some(sender) = guard.wallets.get_mut(&from) {
            sender.balance -= needed;
            sender.touch(now);
        }
        if let Some(receiver) = guard.wallets.get_mut(&to) {
            receiver.balance += amount;
            receiver.touch(now);
        }
        guard.counters.burned_fees += fee;

        let evicted = guard.mempool.push(tx.clone());
        if !evicted.is_empty() {
            warn!("mempool overflow, dropped {} oldest transactions", evicted.len());
        }
        Ok(tx)
    }

    /// Faucet grant to the seed's wallet
    pub fn faucet(&self, seed: &str, amount: f64, now: u64) -> StateResult<f64> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(StateError::InvalidAmount(amount));
        }
        let mut guard = self.ledger.lock();
        let address = Self::address_for_seed(&mut guard, seed);
        let wallet = guard
            .wallets
            .get_mut(&address)
            .ok_or_else(|| StateError::WalletNotFound(address.clone()))?;
        wallet.balance += amount;
        wallet.touch(now);
        let balance = wallet.balance;
        guard.counters.emitted_faucet += amount;
        guard.mempool.push(Transaction::Faucet {
            to: address,
            amount,
            timestamp: now,
        });
        Ok(balance)
    }

    /// Register a username for the seed's wallet
    pub fn register_username(&self, seed: &str, name: &str, now: u64) -> StateResult<String> {
        let name = name.trim_start_matches('@').to_lowercase();
        if name.len() < 3
            || name.len() > 20
            || !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(StateError::UsernameFormat(name));
        }
        let mut guard = self.ledger.lock();
        if guard.usernames.contains_key(&name) {
            return Err(StateError::UsernameTaken(name));
        }
        let address = Self::address_for_seed(&mut guard, seed);
        let wallet = guard
            .wallets
            .get_mut(&address)
            .ok_or_else(|| StateError::WalletNotFound(address.clone()))?;
        wallet.username = Some(name.clone());
        guard.usernames.insert(name.clone(), address.clone());
        guard.mempool.push(Transaction::UsernameRegister {
            from: address,
            username: name.clone(),
            fee: 0.0,
            timestamp: now,
        });
        Ok(name)
    }

    /// Sliding-window rate limiter keyed by an arbitrary identifier
    pub fn rate_limit_check(&self, identifier: &str, max: usize, window_secs: u64, now: u64) -> bool {
        let mut guard = self.ledger.lock();
        let entries = guard.rate_limits.entry(identifier.to_string()).or_default();
        entries.retain(|t| now.saturating_sub(*t) < window_secs);
        if entries.len() >= max {
            return false;
        }
        entries.push(now);
        true
    }

    /// Look up a registered username by key id
    pub fn get_username_by_key_id(&self, key_id: &str) -> Option<String> {
        if key_id.is_empty() {
            return None;
        }
        let guard = self.ledger.lock();
        guard
            .wallets
            .values()
            .find(|w| w.key_id == key_id)
            .and_then(|w| w.username.as_ref().map(|u| format!("@{u}")))
    }
}
