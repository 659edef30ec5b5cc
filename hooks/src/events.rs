//! Event feed.

use pulseboard_realtime::{
    channels, DataPointType, Priority, RealTimeDataPoint, RealtimeContext,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::HookError;
use crate::history::BoundedHistory;
use crate::hook::{self, Applied, Attachment, HookState};

/// Default number of retained events.
pub const DEFAULT_MAX_EVENTS: usize = 100;

/// One business event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Event id.
    pub id: String,
    /// Event subtype, e.g. `order_placed`.
    pub event_type: String,
    /// Optional description.
    pub description: Option<String>,
    /// Originating domain.
    pub domain: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Priority from the point metadata.
    pub priority: Option<Priority>,
    /// Full payload.
    pub data: Map<String, Value>,
}

/// Event feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventFeedConfig {
    /// Channel to subscribe to.
    pub channel: String,
    /// Maximum retained events.
    pub max_events: usize,
    /// Accepted event subtypes; empty accepts all.
    pub event_types: Vec<String>,
}

impl Default for EventFeedConfig {
    fn default() -> Self {
        Self {
            channel: channels::EVENTS.to_string(),
            max_events: DEFAULT_MAX_EVENTS,
            event_types: Vec::new(),
        }
    }
}

impl EventFeedConfig {
    /// Sets the channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Sets the retention bound.
    #[must_use]
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Accepts one more event subtype.
    #[must_use]
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), HookError> {
        if self.channel.is_empty() {
            return Err(HookError::InvalidConfig("channel cannot be empty".to_string()));
        }
        if self.max_events == 0 {
            return Err(HookError::InvalidConfig("max_events must be > 0".to_string()));
        }
        Ok(())
    }

    fn accepts(&self, event_type: &str) -> bool {
        self.event_types.is_empty() || self.event_types.iter().any(|t| t == event_type)
    }
}

/// Read-only view of an event feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSnapshot {
    /// Retained events, newest first.
    pub events: Vec<EventRecord>,
    /// Most recent event.
    pub latest: Option<EventRecord>,
    /// Last validation failure.
    pub error: Option<String>,
}

/// State machine behind [`EventFeed`].
#[derive(Debug)]
pub struct EventState {
    config: EventFeedConfig,
    events: BoundedHistory<EventRecord>,
    sequence: u64,
    error: Option<HookError>,
}

impl EventState {
    /// Creates an empty state.
    #[must_use]
    pub fn new(config: EventFeedConfig) -> Self {
        Self {
            events: BoundedHistory::new(config.max_events),
            sequence: 0,
            error: None,
            config,
        }
    }

    /// Returns the most recent event.
    #[must_use]
    pub fn latest(&self) -> Option<&EventRecord> {
        self.events.front()
    }

    /// Removes every event.
    pub fn clear(&mut self) {
        self.events.clear();
        self.error = None;
    }

    /// Returns a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            events: self.events.to_vec(),
            latest: self.latest().cloned(),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

impl HookState for EventState {
    fn apply(&mut self, point: &RealTimeDataPoint) -> Result<Applied, HookError> {
        if point.kind != DataPointType::Event {
            return Ok(Applied::Ignored);
        }

        let event_type = hook::text(point, "eventType")?;
        if !self.config.accepts(&event_type) {
            return Ok(Applied::Ignored);
        }
        let description = hook::optional_text(point, "description")?;

        let id = match hook::optional_text(point, "id")? {
            Some(id) => {
                if self.events.iter().any(|e| e.id == id) {
                    debug!("Ignoring duplicate event {}", id);
                    return Ok(Applied::Ignored);
                }
                id
            }
            None => {
                self.sequence += 1;
                hook::derived_id("event", point.timestamp, self.sequence)
            }
        };

        self.events.push_front(EventRecord {
            id,
            event_type,
            description,
            domain: point.domain.clone(),
            timestamp: point.timestamp,
            priority: point.priority(),
            data: point.data.clone(),
        });
        Ok(Applied::Accepted)
    }

    fn error_slot(&mut self) -> &mut Option<HookError> {
        &mut self.error
    }
}

/// Event hook attached to a context.
#[derive(Debug)]
pub struct EventFeed {
    attachment: Attachment<EventState>,
}

impl EventFeed {
    /// Subscribes a new event feed to `config.channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn attach(context: &RealtimeContext, config: EventFeedConfig) -> Result<Self, HookError> {
        config.validate()?;
        let channel = config.channel.clone();
        Ok(Self {
            attachment: Attachment::new(context, &channel, EventState::new(config)),
        })
    }

    /// Returns the channel.
    #[must_use]
    pub fn channel(&self) -> &str {
        self.attachment.channel()
    }

    /// Returns true while subscribed.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attachment.is_attached()
    }

    /// Returns a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> EventSnapshot {
        self.attachment.state().snapshot()
    }

    /// Returns the most recent event.
    #[must_use]
    pub fn latest(&self) -> Option<EventRecord> {
        self.attachment.state().latest().cloned()
    }

    /// Removes every event.
    pub fn clear(&self) {
        self.attachment.state().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulseboard_realtime::DataPointMetadata;
    use serde_json::json;

    fn event_point(data: Value) -> RealTimeDataPoint {
        RealTimeDataPoint::new(
            1_700_000_000_000,
            DataPointType::Event,
            "sales",
            data.as_object().cloned().unwrap_or_default(),
        )
    }

    #[test]
    fn test_events_newest_first_with_latest() {
        let mut state = EventState::new(EventFeedConfig::default());
        state.ingest(&event_point(json!({"id": "e1", "eventType": "order_placed"})));
        state.ingest(&event_point(json!({"id": "e2", "eventType": "order_shipped"})));

        let snapshot = state.snapshot();
        let ids: Vec<&str> = snapshot.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e2", "e1"]);
        assert_eq!(snapshot.latest.map(|e| e.id), Some("e2".to_string()));
    }

    #[test]
    fn test_event_type_filter() {
        let config = EventFeedConfig::default().with_event_type("order_placed");
        let mut state = EventState::new(config);
        state.ingest(&event_point(json!({"id": "e1", "eventType": "user_signup"})));
        state.ingest(&event_point(json!({"id": "e2", "eventType": "order_placed"})));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.events[0].event_type, "order_placed");
    }

    #[test]
    fn test_capacity_and_dedup() {
        let mut state = EventState::new(EventFeedConfig::default().with_max_events(2));
        for id in ["e1", "e2", "e2", "e3"] {
            state.ingest(&event_point(json!({"id": id, "eventType": "tick"})));
        }

        let ids: Vec<String> = state.snapshot().events.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["e3", "e2"]);
    }

    #[test]
    fn test_priority_and_payload_kept() {
        let mut state = EventState::new(EventFeedConfig::default());
        let point = event_point(json!({"eventType": "refund", "amount": 12.5})).with_metadata(
            DataPointMetadata {
                priority: Some(Priority::High),
                ..Default::default()
            },
        );
        state.ingest(&point);

        let latest = state.latest().cloned().expect("event");
        assert_eq!(latest.priority, Some(Priority::High));
        assert_eq!(latest.data.get("amount"), Some(&json!(12.5)));
        assert!(latest.id.starts_with("event-"));
    }

    #[test]
    fn test_missing_event_type_sets_error() {
        let mut state = EventState::new(EventFeedConfig::default());
        state.ingest(&event_point(json!({"id": "e1"})));
        assert!(state.snapshot().error.is_some());
        assert!(state.latest().is_none());
    }

    #[test]
    fn test_clear() {
        let mut state = EventState::new(EventFeedConfig::default());
        state.ingest(&event_point(json!({"id": "e1", "eventType": "x"})));
        state.clear();
        assert!(state.snapshot().events.is_empty());
        assert!(state.latest().is_none());
    }
}
