//! Message and group collections
//!
//! Ephemeral messages ride in blocks and evaporate after five minutes;
//! persistent messages survive cleanup. Both are end-to-end encrypted
//! envelopes, the store never sees plaintext.

use lac_crypto::EncryptedMessage;
use serde::{Deserialize, Serialize};

/// A message included in a block, dropped by cleanup after its TTL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EphemeralMessage {
    /// Recipient address
    pub to: String,
    /// Encrypted envelope
    pub envelope: EncryptedMessage,
    /// Send timestamp
    pub timestamp: u64,
}

/// A message kept outside the ephemeral window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentMessage {
    /// Message id
    pub id: String,
    /// Recipient address
    pub to: String,
    /// Encrypted envelope
    pub envelope: EncryptedMessage,
    /// Send timestamp
    pub timestamp: u64,
}

/// A post inside a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPost {
    /// Poster address
    pub from: String,
    /// Post body
    pub text: String,
    /// Post timestamp
    pub ts: u64,
}

/// A chat group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Display name
    pub name: String,
    /// Posts, oldest first
    #[serde(default)]
    pub posts: Vec<GroupPost>,
}

impl Group {
    /// Drop posts older than `cutoff`
    pub fn prune_posts(&mut self, cutoff: u64) -> usize {
        let before = self.posts.len();
        self.posts.retain(|p| p.ts >= cutoff);
        before - self.posts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_post_pruning() {
        let mut group = Group {
            name: "general".into(),
            posts: vec![
                GroupPost {
                    from: "a".into(),
                    text: "old".into(),
                    ts: 10,
                },
                GroupPost {
                    from: "b".into(),
                    text: "new".into(),
                    ts: 100,
                },
            ],
        };
        let dropped = group.prune_posts(50);
        assert_eq!(dropped, 1);
        assert_eq!(group.posts.len(), 1);
        assert_eq!(group.posts[0].text, "new");
    }
}
