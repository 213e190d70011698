//! New-node bootstrap
//!
//! Instead of replaying history, a new node asks ≥3 peers for their
//! latest commitment, adopts the one ≥67% agree on, verifies the
//! commitment chain back to a trusted checkpoint (or the empty-string
//! genesis link), downloads the account set and checks it against the
//! committed UTXO root, then pulls the last 30 days of full blocks and
//! the active validator list.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::commitment::{utxo_root, AccountSnapshot, StateCommitment};
use crate::config::ZeroHistoryConfig;
use crate::errors::{ZeroHistoryError, ZeroHistoryResult};
use crate::tiers::L3Block;
use crate::validator::ValidatorInfo;

/// Chain-walk safety cap
const MAX_CHAIN_WALK: usize = 1_000;
/// L3 window downloaded during bootstrap, seconds
const RECENT_WINDOW_SECS: u64 = 30 * 24 * 3600;

/// What a bootstrap peer must answer
#[async_trait]
pub trait BootstrapPeer: Send + Sync {
    /// The peer's newest commitment
    async fn latest_commitment(&self) -> Option<StateCommitment>;
    /// A commitment by its hash
    async fn commitment_by_hash(&self, hash: &str) -> Option<StateCommitment>;
    /// The peer's full account set
    async fn account_set(&self) -> Option<AccountSnapshot>;
    /// Full blocks newer than `since`
    async fn recent_blocks(&self, since: u64) -> Vec<L3Block>;
    /// The peer's active validator list
    async fn validators(&self) -> Vec<ValidatorInfo>;
}

/// Everything a new node needs to start validating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapPackage {
    pub latest_commitment: StateCommitment,
    pub utxo_set: AccountSnapshot,
    pub recent_blocks: Vec<L3Block>,
    pub validator_list: Vec<ValidatorInfo>,
    /// Commitment hashes walked, newest first
    pub checkpoint_chain: Vec<String>,
}

/// Runs the bootstrap protocol against a peer set
pub struct Bootstrapper {
    config: ZeroHistoryConfig,
    trusted_checkpoints: Vec<(u64, String)>,
}

impl Bootstrapper {
    /// Bootstrapper with no pinned checkpoints
    pub fn new(config: ZeroHistoryConfig) -> Self {
        Self {
            config,
            trusted_checkpoints: Vec::new(),
        }
    }

    /// Pin a hardcoded trusted checkpoint
    pub fn add_trusted_checkpoint(&mut self, height: u64, commitment_hash: String) {
        info!("trusted checkpoint pinned: #{height} -> {}", &commitment_hash[..16.min(commitment_hash.len())]);
        self.trusted_checkpoints.push((height, commitment_hash));
    }

    fn is_trusted(&self, commitment: &StateCommitment) -> bool {
        self.trusted_checkpoints
            .iter()
            .any(|(height, hash)| *height == commitment.block_height && *hash == commitment.hash())
    }

    /// Run the full bootstrap. `now` anchors the 30-day block window.
    pub async fn bootstrap(
        &self,
        peers: &[Arc<dyn BootstrapPeer>],
        now: u64,
    ) -> ZeroHistoryResult<BootstrapPackage> {
        if peers.len() < self.config.bootstrap_min_peers {
            return Err(ZeroHistoryError::InsufficientPeers {
                got: peers.len(),
                need: self.config.bootstrap_min_peers,
            });
        }

        // Gather latest commitments and find the quorum
        let mut responses = Vec::new();
        for peer in peers {
            if let Some(commitment) = peer.latest_commitment().await {
                responses.push(commitment);
            }
        }
        let latest = self.find_consensus(&responses)?;
        info!("bootstrap consensus at height {}", latest.block_height);

        // Verify the commitment chain back to trust
        let checkpoint_chain = self.verify_chain(peers, &latest).await?;

        // Account set must match the committed root
        let mut utxo_set = None;
        for peer in peers {
            if let Some(accounts) = peer.account_set().await {
                utxo_set = Some(accounts);
                break;
            }
        }
        let utxo_set = utxo_set.ok_or(ZeroHistoryError::UtxoMismatch)?;
        if utxo_root(&utxo_set) != latest.utxo_root {
            return Err(ZeroHistoryError::UtxoMismatch);
        }

        // Recent full blocks and the validator set
        let since = now.saturating_sub(RECENT_WINDOW_SECS);
        let mut recent_blocks = Vec::new();
        let mut validator_list = Vec::new();
        for peer in peers {
            let blocks = peer.recent_blocks(since).await;
            if !blocks.is_empty() && recent_blocks.is_empty() {
                recent_blocks = blocks;
            }
            let validators = peer.validators().await;
            if !validators.is_empty() && validator_list.is_empty() {
                validator_list = validators;
            }
        }

        info!(
            "bootstrap complete: height {}, {} accounts, {} recent blocks, {} validators",
            latest.block_height,
            utxo_set.len(),
            recent_blocks.len(),
            validator_list.len()
        );

        Ok(BootstrapPackage {
            latest_commitment: latest,
            utxo_set,
            recent_blocks,
            validator_list,
            checkpoint_chain,
        })
    }

    /// The commitment agreed on by ≥ the consensus fraction of peers
    fn find_consensus(&self, responses: &[StateCommitment]) -> ZeroHistoryResult<StateCommitment> {
        if responses.is_empty() {
            return Err(ZeroHistoryError::NoConsensus);
        }
        let mut groups: HashMap<String, Vec<&StateCommitment>> = HashMap::new();
        for commitment in responses {
            groups.entry(commitment.hash()).or_default().push(commitment);
        }
        for group in groups.values() {
            if group.len() as f64 / responses.len() as f64 >= self.config.bootstrap_consensus {
                return Ok(group[0].clone());
            }
        }
        Err(ZeroHistoryError::NoConsensus)
    }

    /// Walk `previous_commitment` links until a trusted checkpoint or
    /// the empty genesis link. Returns the hashes walked, newest first.
    async fn verify_chain(
        &self,
        peers: &[Arc<dyn BootstrapPeer>],
        latest: &StateCommitment,
    ) -> ZeroHistoryResult<Vec<String>> {
        let mut chain = vec![latest.hash()];
        let mut current = latest.clone();

        for _ in 0..MAX_CHAIN_WALK {
            if self.is_trusted(&current) {
                info!("reached trusted checkpoint at #{}", current.block_height);
                return Ok(chain);
            }
            if current.previous_commitment.is_empty() {
                // genesis link
                return Ok(chain);
            }

            let mut previous = None;
            for peer in peers {
                if let Some(found) = peer.commitment_by_hash(&current.previous_commitment).await {
                    previous = Some(found);
                    break;
                }
            }
            let Some(previous) = previous else {
                warn!("no peer could serve commitment {}", &current.previous_commitment[..16.min(current.previous_commitment.len())]);
                return Err(ZeroHistoryError::ChainVerificationFailed(format!(
                    "missing commitment {}",
                    current.previous_commitment
                )));
            };
            if previous.hash() != current.previous_commitment {
                return Err(ZeroHistoryError::ChainVerificationFailed(
                    "previous_commitment hash mismatch".into(),
                ));
            }
            chain.push(previous.hash());
            current = previous;
        }

        Err(ZeroHistoryError::ChainVerificationFailed(
            "chain walk exceeded safety limit".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::state_hash;

    struct MockPeer {
        commitments: Vec<StateCommitment>,
        accounts: AccountSnapshot,
    }

    #[async_trait]
    impl BootstrapPeer for MockPeer {
        async fn latest_commitment(&self) -> Option<StateCommitment> {
            self.commitments.last().cloned()
        }
        async fn commitment_by_hash(&self, hash: &str) -> Option<StateCommitment> {
            self.commitments.iter().find(|c| c.hash() == hash).cloned()
        }
        async fn account_set(&self) -> Option<AccountSnapshot> {
            Some(self.accounts.clone())
        }
        async fn recent_blocks(&self, _since: u64) -> Vec<L3Block> {
            Vec::new()
        }
        async fn validators(&self) -> Vec<ValidatorInfo> {
            Vec::new()
        }
    }

    fn accounts() -> AccountSnapshot {
        [("lac1a".to_string(), 500.0), ("lac1b".to_string(), 250.0)]
            .into_iter()
            .collect()
    }

    fn commitment_chain(accounts: &AccountSnapshot, heights: &[u64]) -> Vec<StateCommitment> {
        let mut chain: Vec<StateCommitment> = Vec::new();
        for &height in heights {
            let utxo = utxo_root(accounts);
            let supply: f64 = accounts.values().sum();
            let previous = chain.last().map(|c: &StateCommitment| c.hash()).unwrap_or_default();
            chain.push(StateCommitment {
                block_height: height,
                commitment_hash: state_hash(height, "mr", &utxo, supply),
                merkle_root: "mr".into(),
                utxo_root: utxo,
                total_supply: supply,
                validator_address: "lac1v".into(),
                validator_level: 5,
                timestamp: height * 10,
                witness_signatures: vec![],
                witness_addresses: vec![],
                previous_commitment: previous,
            });
        }
        chain
    }

    fn peers_with_chain(n: usize, chain: &[StateCommitment]) -> Vec<Arc<dyn BootstrapPeer>> {
        (0..n)
            .map(|_| {
                Arc::new(MockPeer {
                    commitments: chain.to_vec(),
                    accounts: accounts(),
                }) as Arc<dyn BootstrapPeer>
            })
            .collect()
    }

    #[tokio::test]
    async fn test_bootstrap_happy_path() {
        let accounts = accounts();
        let chain = commitment_chain(&accounts, &[10, 20, 30]);
        let peers = peers_with_chain(3, &chain);

        let bootstrapper = Bootstrapper::new(ZeroHistoryConfig::dev());
        let package = bootstrapper.bootstrap(&peers, 1_000_000).await.unwrap();

        assert_eq!(package.latest_commitment.block_height, 30);
        assert_eq!(package.utxo_set.len(), 2);
        // walked the whole chain back to the genesis link
        assert_eq!(package.checkpoint_chain.len(), 3);
    }

    #[tokio::test]
    async fn test_too_few_peers() {
        let accounts = accounts();
        let chain = commitment_chain(&accounts, &[10]);
        let peers = peers_with_chain(2, &chain);

        let bootstrapper = Bootstrapper::new(ZeroHistoryConfig::dev());
        let err = bootstrapper.bootstrap(&peers, 1_000_000).await.unwrap_err();
        assert!(matches!(
            err,
            ZeroHistoryError::InsufficientPeers { got: 2, need: 3 }
        ));
    }

    #[tokio::test]
    async fn test_no_consensus_among_peers() {
        let accounts = accounts();
        let chain_a = commitment_chain(&accounts, &[10]);
        let mut divergent = accounts.clone();
        divergent.insert("lac1evil".into(), 1.0);
        let chain_b = commitment_chain(&divergent, &[10]);
        let chain_c = commitment_chain(&accounts, &[20]);

        let peers: Vec<Arc<dyn BootstrapPeer>> = vec![
            Arc::new(MockPeer { commitments: chain_a, accounts: accounts.clone() }),
            Arc::new(MockPeer { commitments: chain_b, accounts: divergent }),
            Arc::new(MockPeer { commitments: chain_c, accounts: accounts.clone() }),
        ];

        let bootstrapper = Bootstrapper::new(ZeroHistoryConfig::dev());
        let err = bootstrapper.bootstrap(&peers, 1_000_000).await.unwrap_err();
        assert!(matches!(err, ZeroHistoryError::NoConsensus));
    }

    #[tokio::test]
    async fn test_utxo_mismatch_rejected() {
        let honest = accounts();
        let chain = commitment_chain(&honest, &[10]);
        // peers claim a different account set than the one committed
        let mut lying = honest.clone();
        lying.insert("lac1extra".into(), 9_999.0);
        let peers: Vec<Arc<dyn BootstrapPeer>> = (0..3)
            .map(|_| {
                Arc::new(MockPeer {
                    commitments: chain.clone(),
                    accounts: lying.clone(),
                }) as Arc<dyn BootstrapPeer>
            })
            .collect();

        let bootstrapper = Bootstrapper::new(ZeroHistoryConfig::dev());
        let err = bootstrapper.bootstrap(&peers, 1_000_000).await.unwrap_err();
        assert!(matches!(err, ZeroHistoryError::UtxoMismatch));
    }

    #[tokio::test]
    async fn test_trusted_checkpoint_short_circuits_walk() {
        let accounts = accounts();
        let chain = commitment_chain(&accounts, &[10, 20, 30]);
        let peers = peers_with_chain(3, &chain);

        let mut bootstrapper = Bootstrapper::new(ZeroHistoryConfig::dev());
        bootstrapper.add_trusted_checkpoint(20, chain[1].hash());

        let package = bootstrapper.bootstrap(&peers, 1_000_000).await.unwrap();
        // walk stops at the pinned checkpoint: 30 and 20 only
        assert_eq!(package.checkpoint_chain.len(), 2);
    }
}
