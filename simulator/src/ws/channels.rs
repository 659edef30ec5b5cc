//! Server-wide channel directory.
//!
//! Tracks which sessions are subscribed to which channels.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

/// Channel name to subscribed session ids.
#[derive(Debug, Default)]
pub struct ChannelDirectory {
    subscriptions: Arc<RwLock<HashMap<String, HashSet<u64>>>>,
}

impl ChannelDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a session to a channel.
    pub async fn subscribe(&self, channel: &str, session_id: u64) {
        let mut subs = self.subscriptions.write().await;
        subs.entry(channel.to_string())
            .or_default()
            .insert(session_id);
    }

    /// Unsubscribes a session from a channel.
    pub async fn unsubscribe(&self, channel: &str, session_id: u64) {
        let mut subs = self.subscriptions.write().await;
        if let Some(sessions) = subs.get_mut(channel) {
            sessions.remove(&session_id);
            if sessions.is_empty() {
                subs.remove(channel);
            }
        }
    }

    /// Unsubscribes a session from every channel.
    pub async fn unsubscribe_all(&self, session_id: u64) {
        let mut subs = self.subscriptions.write().await;
        subs.retain(|_, sessions| {
            sessions.remove(&session_id);
            !sessions.is_empty()
        });
    }

    /// Returns the session ids subscribed to a channel.
    pub async fn subscribers(&self, channel: &str) -> Vec<u64> {
        let subs = self.subscriptions.read().await;
        subs.get(channel)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the number of sessions subscribed to a channel.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        let subs = self.subscriptions.read().await;
        subs.get(channel).map_or(0, HashSet::len)
    }

    /// Returns the channels with at least one session, sorted.
    pub async fn channels(&self) -> Vec<String> {
        let subs = self.subscriptions.read().await;
        let mut channels: Vec<String> = subs.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Returns the total number of subscriptions.
    pub async fn total_subscriptions(&self) -> usize {
        let subs = self.subscriptions.read().await;
        subs.values().map(HashSet::len).sum()
    }
}
