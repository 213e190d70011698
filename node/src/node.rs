//! Node wiring
//!
//! Owns the store and spawns the three cooperative loops: block
//! production (10 s), cleanup (60 s) and peer sync (30 s). Runs until a
//! shutdown signal arrives, then persists one last time.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lac_consensus::{MiningCoordinator, Poet};
use lac_state::store::StateStore;
use lac_zero_history::{ZeroHistoryConfig, ZeroHistoryManager};
use tracing::{info, warn};

use crate::cleanup::{cleanup_loop, CleanupConfig};
use crate::error::NodeResult;
use crate::hooks::{NullHooks, TxHooks};
use crate::now_secs;
use crate::producer::{BlockProducer, ProducerConfig};
use crate::sync::{ChainSync, HttpTransport, PeerSet, SyncConfig};

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory
    pub datadir: PathBuf,
    /// HTTP port this node's API layer listens on
    pub port: u16,
    /// Bootstrap peer URL
    pub bootstrap: Option<String>,
    /// Probe the local network for peers on startup
    pub discover: bool,
    /// Zero-history parameters
    pub zero_history: ZeroHistoryConfig,
    /// Block production interval, seconds
    pub block_interval_secs: u64,
    /// Cleanup interval, seconds
    pub cleanup_interval_secs: u64,
    /// Peer sync interval, seconds
    pub sync_interval_secs: u64,
    /// Producer limits
    pub producer: ProducerConfig,
    /// Cleanup TTLs
    pub cleanup: CleanupConfig,
    /// Sync timeouts
    pub sync: SyncConfig,
}

impl NodeConfig {
    /// Development defaults: short commitment interval, 3 witnesses
    pub fn dev(datadir: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            zero_history: ZeroHistoryConfig::dev(),
            ..Self::prod(datadir, port)
        }
    }

    /// Production defaults
    pub fn prod(datadir: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            datadir: datadir.into(),
            port,
            bootstrap: None,
            discover: false,
            zero_history: ZeroHistoryConfig::prod(),
            block_interval_secs: 10,
            cleanup_interval_secs: 60,
            sync_interval_secs: 30,
            producer: ProducerConfig::default(),
            cleanup: CleanupConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// A running LAC node
pub struct Node {
    config: NodeConfig,
    store: Arc<StateStore>,
    peers: Arc<PeerSet>,
    hooks: Arc<dyn TxHooks>,
}

impl Node {
    /// Open the store and prepare a node
    pub fn new(config: NodeConfig) -> NodeResult<Self> {
        let store = Arc::new(StateStore::open(&config.datadir, now_secs())?);
        Ok(Self {
            config,
            store,
            peers: Arc::new(PeerSet::new()),
            hooks: Arc::new(NullHooks),
        })
    }

    /// Replace the collaborator hooks (username/timelock/game layers)
    pub fn with_hooks(mut self, hooks: Arc<dyn TxHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Shared store handle (for the API layer)
    pub fn store(&self) -> Arc<StateStore> {
        self.store.clone()
    }

    /// Known peers
    pub fn peers(&self) -> Arc<PeerSet> {
        self.peers.clone()
    }

    /// Run until shutdown. Spawns the production, cleanup and sync
    /// loops and waits for ctrl-c.
    pub async fn run(self) -> NodeResult<()> {
        let now = now_secs();
        let (height, supply) = {
            let guard = self.store.lock();
            (guard.height(), guard.total_supply())
        };
        info!(
            "LAC node starting: datadir {}, port {}, height {height}, supply {supply:.2} LAC",
            self.config.datadir.display(),
            self.config.port
        );

        let zero_history =
            ZeroHistoryManager::load(&self.config.datadir, self.config.zero_history.clone());
        let coordinator = MiningCoordinator::new(Poet::new(height + 1, 1.0, supply));
        let mut producer = BlockProducer::new(
            self.store.clone(),
            coordinator,
            zero_history,
            self.config.producer.clone(),
            self.hooks.clone(),
        );

        let transport = Arc::new(HttpTransport::new(self.config.sync.clone()));
        let sync = Arc::new(ChainSync::new(
            self.store.clone(),
            transport,
            self.peers.clone(),
            self.config.sync.clone(),
        ));

        if let Some(peer) = &self.config.bootstrap {
            info!("bootstrapping from {peer}");
            self.peers.add(peer.clone());
            sync.sync_once(now).await;
        }
        if self.config.discover {
            let base = self.config.port.saturating_sub(5);
            let found = sync
                .discover_local(self.config.port, base..=base + 10)
                .await;
            info!("local discovery found {found} peers");
        }

        // Block production loop
        let producer_sync = sync.clone();
        let block_interval = self.config.block_interval_secs;
        let producer_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(block_interval));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match producer.produce_once(now_secs()) {
                    // Broadcast only after produce_once persisted
                    Ok(Some(block)) => {
                        producer_sync.broadcast(&block).await;
                    }
                    Ok(None) => {}
                    Err(e) => warn!("block production failed, retrying next tick: {e}"),
                }
            }
        });

        // Cleanup loop
        let cleanup_task = tokio::spawn(cleanup_loop(
            self.store.clone(),
            self.config.cleanup.clone(),
            self.config.cleanup_interval_secs,
        ));

        // Peer sync loop
        let sync_task = tokio::spawn(sync.clone().run(self.config.sync_interval_secs));

        tokio::signal::ctrl_c()
            .await
            .map_err(lac_state::StateError::Io)?;
        info!("shutdown signal received");

        producer_task.abort();
        cleanup_task.abort();
        sync_task.abort();

        self.store.persist_all(now_secs())?;
        info!("state persisted, goodbye");
        Ok(())
    }
}
