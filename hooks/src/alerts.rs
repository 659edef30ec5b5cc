//! Alert feed.
//!
//! Keeps the most recent alerts, newest first, with an acknowledgement flag
//! per alert and an unread counter.

use std::fmt;
use std::str::FromStr;

use pulseboard_realtime::{channels, DataPointType, RealTimeDataPoint, RealtimeContext};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HookError;
use crate::history::BoundedHistory;
use crate::hook::{self, Applied, Attachment, HookState};

/// Default number of retained alerts.
pub const DEFAULT_MAX_ALERTS: usize = 50;

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational.
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
    /// Critical.
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for AlertSeverity {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            other => Err(HookError::InvalidField {
                field: "severity".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// One alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Alert id.
    pub id: String,
    /// Severity.
    pub severity: AlertSeverity,
    /// Short title.
    pub title: String,
    /// Optional detail.
    pub message: Option<String>,
    /// Originating domain.
    pub domain: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Set by explicit user action only.
    pub acknowledged: bool,
}

/// Alert feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertFeedConfig {
    /// Channel to subscribe to.
    pub channel: String,
    /// Maximum retained alerts.
    pub max_alerts: usize,
    /// Only accept alerts of exactly this severity.
    pub severity: Option<AlertSeverity>,
}

impl Default for AlertFeedConfig {
    fn default() -> Self {
        Self {
            channel: channels::ALERTS.to_string(),
            max_alerts: DEFAULT_MAX_ALERTS,
            severity: None,
        }
    }
}

impl AlertFeedConfig {
    /// Sets the channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Sets the retention bound.
    #[must_use]
    pub fn with_max_alerts(mut self, max: usize) -> Self {
        self.max_alerts = max;
        self
    }

    /// Sets the severity filter.
    #[must_use]
    pub fn with_severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = Some(severity);
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
        if self.max_alerts == 0 {
            return Err(HookError::InvalidConfig("max_alerts must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Read-only view of an alert feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSnapshot {
    /// Retained alerts, newest first.
    pub alerts: Vec<Alert>,
    /// Retained alerts not yet acknowledged.
    pub unread_count: usize,
    /// Last validation failure.
    pub error: Option<String>,
}

/// State machine behind [`AlertFeed`].
#[derive(Debug)]
pub struct AlertState {
    config: AlertFeedConfig,
    alerts: BoundedHistory<Alert>,
    unread: usize,
    sequence: u64,
    error: Option<HookError>,
}

impl AlertState {
    /// Creates an empty state.
    #[must_use]
    pub fn new(config: AlertFeedConfig) -> Self {
        Self {
            alerts: BoundedHistory::new(config.max_alerts),
            unread: 0,
            sequence: 0,
            error: None,
            config,
        }
    }

    fn parse(&mut self, point: &RealTimeDataPoint) -> Result<Alert, HookError> {
        let severity: AlertSeverity = hook::text(point, "severity")?.parse()?;
        let title = hook::text(point, "title")?;
        let message = hook::optional_text(point, "message")?;
        let id = match hook::optional_text(point, "id")? {
            Some(id) => id,
            None => {
                self.sequence += 1;
                hook::derived_id("alert", point.timestamp, self.sequence)
            }
        };

        Ok(Alert {
            id,
            severity,
            title,
            message,
            domain: point.domain.clone(),
            timestamp: point.timestamp,
            acknowledged: false,
        })
    }

    /// Inserts an alert at the front. Returns false for duplicates and for
    /// alerts filtered out by severity.
    pub fn insert(&mut self, alert: Alert) -> bool {
        if self
            .config
            .severity
            .is_some_and(|wanted| wanted != alert.severity)
        {
            return false;
        }
        if self.alerts.iter().any(|a| a.id == alert.id) {
            debug!("Ignoring duplicate alert {}", alert.id);
            return false;
        }

        let unread = !alert.acknowledged;
        if let Some(evicted) = self.alerts.push_front(alert) {
            if !evicted.acknowledged {
                self.unread = self.unread.saturating_sub(1);
            }
        }
        if unread {
            self.unread += 1;
        }
        true
    }

    /// Marks an alert acknowledged. Unknown or already acknowledged ids are
    /// ignored. Returns true if the flag changed.
    pub fn acknowledge(&mut self, id: &str) -> bool {
        let Some(alert) = self.alerts.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        if alert.acknowledged {
            return false;
        }
        alert.acknowledged = true;
        self.unread = self.unread.saturating_sub(1);
        true
    }

    /// Removes every alert and zeroes the unread counter.
    pub fn clear_all(&mut self) {
        self.alerts.clear();
        self.unread = 0;
        self.error = None;
    }

    /// Returns the unread counter.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.unread
    }

    /// Returns a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AlertSnapshot {
        AlertSnapshot {
            alerts: self.alerts.to_vec(),
            unread_count: self.unread,
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

impl HookState for AlertState {
    fn apply(&mut self, point: &RealTimeDataPoint) -> Result<Applied, HookError> {
        if point.kind != DataPointType::Alert {
            return Ok(Applied::Ignored);
        }

        let alert = self.parse(point)?;
        if self.insert(alert) {
            Ok(Applied::Accepted)
        } else {
            Ok(Applied::Ignored)
        }
    }

    fn error_slot(&mut self) -> &mut Option<HookError> {
        &mut self.error
    }
}

/// Alert hook attached to a context.
#[derive(Debug)]
pub struct AlertFeed {
    attachment: Attachment<AlertState>,
}

impl AlertFeed {
    /// Subscribes a new alert feed to `config.channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn attach(context: &RealtimeContext, config: AlertFeedConfig) -> Result<Self, HookError> {
        config.validate()?;
        let channel = config.channel.clone();
        Ok(Self {
            attachment: Attachment::new(context, &channel, AlertState::new(config)),
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
    pub fn snapshot(&self) -> AlertSnapshot {
        self.attachment.state().snapshot()
    }

    /// Returns the unread counter.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.attachment.state().unread_count()
    }

    /// Marks an alert acknowledged.
    pub fn acknowledge(&self, id: &str) -> bool {
        self.attachment.state().acknowledge(id)
    }

    /// Removes every alert.
    pub fn clear_all(&self) {
        self.attachment.state().clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn alert_point(data: Value) -> RealTimeDataPoint {
        RealTimeDataPoint::new(
            1_700_000_000_000,
            DataPointType::Alert,
            "inventory",
            data.as_object().cloned().unwrap_or_default(),
        )
    }

    fn state() -> AlertState {
        AlertState::new(AlertFeedConfig::default())
    }

    #[test]
    fn test_severity_parse_and_order() {
        assert_eq!("critical".parse::<AlertSeverity>(), Ok(AlertSeverity::Critical));
        assert!("fatal".parse::<AlertSeverity>().is_err());
        assert!(AlertSeverity::Critical > AlertSeverity::Warning);
        assert_eq!(AlertSeverity::Warning.to_string(), "warning");
    }

    #[test]
    fn test_arrivals_acknowledge_and_clear() {
        let mut state = state();
        for id in ["a1", "a2", "a3"] {
            state.ingest(&alert_point(
                json!({"id": id, "severity": "warning", "title": "Low stock"}),
            ));
        }
        assert_eq!(state.unread_count(), 3);

        assert!(state.acknowledge("a2"));
        let snapshot = state.snapshot();
        assert_eq!(snapshot.unread_count, 2);
        let acked: Vec<&str> = snapshot
            .alerts
            .iter()
            .filter(|a| a.acknowledged)
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(acked, vec!["a2"]);

        state.clear_all();
        let snapshot = state.snapshot();
        assert!(snapshot.alerts.is_empty());
        assert_eq!(snapshot.unread_count, 0);
    }

    #[test]
    fn test_newest_first() {
        let mut state = state();
        state.ingest(&alert_point(json!({"id": "old", "severity": "info", "title": "t"})));
        state.ingest(&alert_point(json!({"id": "new", "severity": "info", "title": "t"})));

        let ids: Vec<String> = state.snapshot().alerts.into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_acknowledge_is_idempotent() {
        let mut state = state();
        state.ingest(&alert_point(json!({"id": "a1", "severity": "error", "title": "t"})));

        assert!(state.acknowledge("a1"));
        assert!(!state.acknowledge("a1"));
        assert!(!state.acknowledge("missing"));
        assert_eq!(state.unread_count(), 0);
    }

    #[test]
    fn test_duplicate_ids_ignored() {
        let mut state = state();
        let point = alert_point(json!({"id": "a1", "severity": "error", "title": "t"}));
        assert_eq!(state.ingest(&point), Applied::Accepted);
        assert_eq!(state.ingest(&point), Applied::Ignored);
        assert_eq!(state.snapshot().alerts.len(), 1);
        assert_eq!(state.unread_count(), 1);
    }

    #[test]
    fn test_severity_filter() {
        let mut state =
            AlertState::new(AlertFeedConfig::default().with_severity(AlertSeverity::Critical));
        state.ingest(&alert_point(json!({"id": "w", "severity": "warning", "title": "t"})));
        state.ingest(&alert_point(json!({"id": "c", "severity": "critical", "title": "t"})));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.alerts.len(), 1);
        assert_eq!(snapshot.alerts[0].id, "c");
        assert_eq!(snapshot.unread_count, 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut state = AlertState::new(AlertFeedConfig::default().with_max_alerts(2));
        for id in ["a1", "a2", "a3"] {
            state.ingest(&alert_point(json!({"id": id, "severity": "info", "title": "t"})));
        }

        let snapshot = state.snapshot();
        let ids: Vec<&str> = snapshot.alerts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a3", "a2"]);
        assert_eq!(snapshot.unread_count, 2);
    }

    #[test]
    fn test_missing_ids_are_derived() {
        let mut state = state();
        state.ingest(&alert_point(json!({"severity": "info", "title": "first"})));
        state.ingest(&alert_point(json!({"severity": "info", "title": "second"})));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.alerts.len(), 2);
        assert_ne!(snapshot.alerts[0].id, snapshot.alerts[1].id);
    }

    #[test]
    fn test_invalid_alert_sets_error() {
        let mut state = state();
        state.ingest(&alert_point(json!({"id": "a1", "severity": "fatal", "title": "t"})));
        assert!(state.snapshot().error.is_some());
        assert!(state.snapshot().alerts.is_empty());

        state.ingest(&alert_point(json!({"id": "a2", "severity": "info"})));
        assert!(state.snapshot().error.is_some());

        state.ingest(&alert_point(json!({"id": "a3", "severity": "info", "title": "ok"})));
        assert!(state.snapshot().error.is_none());
    }

    #[test]
    fn test_other_types_ignored() {
        let mut state = state();
        let point = RealTimeDataPoint::new(
            1,
            DataPointType::Kpi,
            "sales",
            json!({"id": "x", "value": 1})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        );
        assert_eq!(state.ingest(&point), Applied::Ignored);
        assert!(state.snapshot().error.is_none());
        assert!(state.snapshot().alerts.is_empty());
    }
}
