//! Peer synchronization
//!
//! Best-effort HTTP with short timeouts: 0.5 s discovery pings, 3 s
//! block broadcast, 5 s height probes, 10 s range fetches. The sync
//! loop pulls higher chains from known peers every ~30 seconds and
//! appends only blocks that hash-link onto the local tip; a block that
//! fails validation is rejected and the local chain kept. Broadcast is
//! called after persistence, so peers only ever receive durable blocks.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lac_state::store::StateStore;
use lac_state::Block;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Sync timeouts and batching
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Discovery ping timeout
    pub discovery_timeout: Duration,
    /// Broadcast timeout
    pub broadcast_timeout: Duration,
    /// Height probe timeout
    pub height_timeout: Duration,
    /// Range fetch timeout
    pub range_timeout: Duration,
    /// Blocks per range request
    pub range_batch: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_millis(500),
            broadcast_timeout: Duration::from_secs(3),
            height_timeout: Duration::from_secs(5),
            range_timeout: Duration::from_secs(10),
            range_batch: 100,
        }
    }
}

/// Transport a sync loop speaks to peers through
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Liveness probe
    async fn ping(&self, peer: &str) -> bool;
    /// The peer's chain height
    async fn height(&self, peer: &str) -> Option<u64>;
    /// Blocks in an inclusive height range
    async fn blocks_range(&self, peer: &str, from: u64, to: u64) -> Option<Vec<Block>>;
    /// Push a block to the peer
    async fn submit_block(&self, peer: &str, block: &Block) -> bool;
}

#[derive(Deserialize)]
struct HeightResponse {
    height: u64,
}

#[derive(Deserialize)]
struct BlocksResponse {
    blocks: Vec<Block>,
}

/// HTTP transport over a peer's JSON API
pub struct HttpTransport {
    client: reqwest::Client,
    config: SyncConfig,
}

impl HttpTransport {
    /// Transport with the configured timeouts
    pub fn new(config: SyncConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn ping(&self, peer: &str) -> bool {
        self.client
            .get(format!("{peer}/api/ping"))
            .timeout(self.config.discovery_timeout)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn height(&self, peer: &str) -> Option<u64> {
        let response = self
            .client
            .get(format!("{peer}/api/chain/height"))
            .timeout(self.config.height_timeout)
            .send()
            .await
            .ok()?;
        response.json::<HeightResponse>().await.ok().map(|h| h.height)
    }

    async fn blocks_range(&self, peer: &str, from: u64, to: u64) -> Option<Vec<Block>> {
        let response = self
            .client
            .get(format!("{peer}/api/blocks/range?from={from}&to={to}"))
            .timeout(self.config.range_timeout)
            .send()
            .await
            .ok()?;
        response.json::<BlocksResponse>().await.ok().map(|b| b.blocks)
    }

    async fn submit_block(&self, peer: &str, block: &Block) -> bool {
        self.client
            .post(format!("{peer}/api/block/submit"))
            .timeout(self.config.broadcast_timeout)
            .json(block)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// Known peer URLs
#[derive(Debug, Default)]
pub struct PeerSet {
    peers: Mutex<BTreeSet<String>>,
}

impl PeerSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer; returns whether it was new
    pub fn add(&self, url: impl Into<String>) -> bool {
        self.peers.lock().insert(url.into())
    }

    /// Snapshot of known peers
    pub fn list(&self) -> Vec<String> {
        self.peers.lock().iter().cloned().collect()
    }

    /// Number of known peers
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    /// Whether no peers are known
    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }
}

/// The peer sync driver
pub struct ChainSync {
    store: Arc<StateStore>,
    transport: Arc<dyn PeerTransport>,
    peers: Arc<PeerSet>,
    config: SyncConfig,
}

impl ChainSync {
    /// Build a sync driver
    pub fn new(
        store: Arc<StateStore>,
        transport: Arc<dyn PeerTransport>,
        peers: Arc<PeerSet>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            transport,
            peers,
            config,
        }
    }

    /// One sync pass over every known peer. Returns blocks adopted.
    pub async fn sync_once(&self, now: u64) -> usize {
        let mut adopted_total = 0;
        for peer in self.peers.list() {
            let Some(peer_height) = self.transport.height(&peer).await else {
                debug!("peer {peer} unreachable");
                continue;
            };
            let local_height = self.store.lock().height();
            if peer_height <= local_height {
                continue;
            }
            info!("peer {peer} at height {peer_height}, local {local_height}, syncing");

            let mut from = local_height + 1;
            while from <= peer_height {
                let to = (from + self.config.range_batch - 1).min(peer_height);
                let Some(blocks) = self.transport.blocks_range(&peer, from, to).await else {
                    break;
                };
                if blocks.is_empty() {
                    break;
                }
                let appended = self.adopt_blocks(&peer, blocks);
                adopted_total += appended;
                if appended == 0 {
                    break;
                }
                from += appended as u64;
            }
        }

        if adopted_total > 0 {
            if let Err(e) = self.store.persist_all(now) {
                warn!("persist after sync failed: {e}");
            }
        }
        adopted_total
    }

    /// Validate and append peer blocks onto the local tip. Stops at the
    /// first block that does not link or whose hash does not match its
    /// canonical encoding.
    fn adopt_blocks(&self, peer: &str, blocks: Vec<Block>) -> usize {
        let mut guard = self.store.lock();
        let mut appended = 0;
        for block in blocks {
            let Some(tip) = guard.chain.last() else {
                break;
            };
            if !block.links_to(tip) {
                warn!(
                    "rejecting block #{} from {peer}: does not link to local tip #{}",
                    block.index, tip.index
                );
                break;
            }
            if !block.verify_hash() {
                warn!("rejecting block #{} from {peer}: hash mismatch", block.index);
                break;
            }
            for tx in &block.transactions {
                if let Some(image) = tx.key_image() {
                    guard.spent_key_images.insert(image.to_string());
                }
            }
            guard.chain.push(block);
            appended += 1;
        }
        appended
    }

    /// Broadcast a durable block to every known peer, best-effort.
    /// Returns how many peers accepted it.
    pub async fn broadcast(&self, block: &Block) -> usize {
        let mut reached = 0;
        for peer in self.peers.list() {
            if self.transport.submit_block(&peer, block).await {
                reached += 1;
            } else {
                debug!("broadcast of #{} to {peer} failed", block.index);
            }
        }
        reached
    }

    /// Probe localhost ports for other nodes and adopt responders
    pub async fn discover_local(&self, own_port: u16, ports: std::ops::RangeInclusive<u16>) -> usize {
        let mut found = 0;
        for port in ports {
            if port == own_port {
                continue;
            }
            let url = format!("http://127.0.0.1:{port}");
            if self.transport.ping(&url).await && self.peers.add(url.clone()) {
                info!("discovered local peer {url}");
                found += 1;
            }
        }
        found
    }

    /// The 30-second sync loop
    pub async fn run(self: Arc<Self>, interval_secs: u64) {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            self.sync_once(crate::now_secs()).await;
        }
    }
}
