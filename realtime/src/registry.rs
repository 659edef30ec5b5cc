//! Channel subscription registry.
//!
//! Maps channel names to the consumers interested in them. Subscriber ids
//! are allocated from a monotonically increasing counter, so iterating a
//! channel's `BTreeMap` yields callbacks in registration order.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::event::RealTimeDataPoint;

/// Consumer callback invoked for every data point on a channel.
pub type Callback = Arc<dyn Fn(&RealTimeDataPoint) + Send + Sync + 'static>;

/// Opaque handle identifying one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Outcome of removing a single subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The subscriber was not registered (already removed or cleared).
    NotFound,
    /// Removed; other subscribers remain on the channel.
    Removed,
    /// Removed, and the channel has no subscribers left.
    ChannelEmptied,
}

/// Manages channel subscriptions for a single connection.
#[derive(Default)]
pub struct ChannelRegistry {
    /// Map from channel name to its callbacks, keyed by subscriber id.
    channels: HashMap<String, BTreeMap<SubscriberId, Callback>>,

    /// Next subscriber id.
    next_id: u64,
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<&str, usize> = self
            .channels
            .iter()
            .map(|(name, subs)| (name.as_str(), subs.len()))
            .collect();
        f.debug_struct("ChannelRegistry")
            .field("channels", &counts)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl ChannelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback on a channel.
    ///
    /// Returns the new subscriber id and whether this was the channel's
    /// first subscriber (an empty to non-empty transition).
    pub fn add(&mut self, channel: &str, callback: Callback) -> (SubscriberId, bool) {
        self.next_id += 1;
        let id = SubscriberId(self.next_id);

        let subscribers = self.channels.entry(channel.to_string()).or_default();
        let first = subscribers.is_empty();
        subscribers.insert(id, callback);

        (id, first)
    }

    /// Removes one subscriber from a channel.
    pub fn remove(&mut self, channel: &str, id: SubscriberId) -> Removal {
        let Some(subscribers) = self.channels.get_mut(channel) else {
            return Removal::NotFound;
        };

        if subscribers.remove(&id).is_none() {
            return Removal::NotFound;
        }

        if subscribers.is_empty() {
            self.channels.remove(channel);
            Removal::ChannelEmptied
        } else {
            Removal::Removed
        }
    }

    /// Removes every subscriber from a channel, returning how many were
    /// removed.
    pub fn clear(&mut self, channel: &str) -> usize {
        self.channels.remove(channel).map_or(0, |subs| subs.len())
    }

    /// Returns true if the subscriber is still registered on the channel.
    #[must_use]
    pub fn contains(&self, channel: &str, id: SubscriberId) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|subs| subs.contains_key(&id))
    }

    /// Returns a snapshot of a channel's callbacks in registration order.
    #[must_use]
    pub fn subscribers(&self, channel: &str) -> Vec<(SubscriberId, Callback)> {
        self.channels
            .get(channel)
            .map(|subs| {
                subs.iter()
                    .map(|(id, cb)| (*id, Arc::clone(cb)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of subscribers on a channel.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, BTreeMap::len)
    }

    /// Returns every channel with at least one subscriber, sorted by name.
    #[must_use]
    pub fn active_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the total number of subscriptions across channels.
    #[must_use]
    pub fn total_subscriptions(&self) -> usize {
        self.channels.values().map(BTreeMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn noop() -> Callback {
        Arc::new(|_: &RealTimeDataPoint| {})
    }

    #[test]
    fn test_add_reports_first_subscriber() {
        let mut registry = ChannelRegistry::new();

        let (_, first) = registry.add("kpis", noop());
        assert!(first);

        let (_, first) = registry.add("kpis", noop());
        assert!(!first);

        let (_, first) = registry.add("alerts", noop());
        assert!(first);

        assert_eq!(registry.subscriber_count("kpis"), 2);
        assert_eq!(registry.total_subscriptions(), 3);
    }

    #[test]
    fn test_remove_reports_channel_emptied() {
        let mut registry = ChannelRegistry::new();
        let (a, _) = registry.add("kpis", noop());
        let (b, _) = registry.add("kpis", noop());

        assert_eq!(registry.remove("kpis", a), Removal::Removed);
        assert!(registry.contains("kpis", b));
        assert_eq!(registry.remove("kpis", b), Removal::ChannelEmptied);
        assert_eq!(registry.remove("kpis", b), Removal::NotFound);
        assert!(registry.active_channels().is_empty());
    }

    #[test]
    fn test_remove_unknown_channel() {
        let mut registry = ChannelRegistry::new();
        let (id, _) = registry.add("kpis", noop());
        assert_eq!(registry.remove("alerts", id), Removal::NotFound);
        assert_eq!(registry.subscriber_count("kpis"), 1);
    }

    #[test]
    fn test_clear_channel() {
        let mut registry = ChannelRegistry::new();
        registry.add("kpis", noop());
        registry.add("kpis", noop());
        registry.add("alerts", noop());

        assert_eq!(registry.clear("kpis"), 2);
        assert_eq!(registry.clear("kpis"), 0);
        assert_eq!(registry.active_channels(), vec!["alerts".to_string()]);
    }

    #[test]
    fn test_subscribers_in_registration_order() {
        let mut registry = ChannelRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.add(
                "events",
                Arc::new(move |_: &RealTimeDataPoint| {
                    if let Ok(mut o) = order.lock() {
                        o.push(tag);
                    }
                }),
            );
        }

        let point = RealTimeDataPoint::new(
            1,
            crate::event::DataPointType::Event,
            "sales",
            serde_json::Map::new(),
        );
        for (_, cb) in registry.subscribers("events") {
            cb(&point);
        }

        let seen = order.lock().expect("lock").clone();
        assert_eq!(seen, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_subscriber_ids_unique() {
        let mut registry = ChannelRegistry::new();
        let (a, _) = registry.add("kpis", noop());
        let (b, _) = registry.add("alerts", noop());
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }
}
