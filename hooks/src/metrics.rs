//! Metrics stream.
//!
//! Retains the most recent numeric samples from a channel, optionally
//! collapsing each aggregation window into its arithmetic mean, and derives
//! a trend from the two most recent retained values.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use pulseboard_realtime::{
    channels, now_millis, DataPointType, RealTimeDataPoint, RealtimeContext,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::HookError;
use crate::history::{BoundedHistory, Trend};
use crate::hook::{self, lock, Applied, Attachment, HookState};

/// Default number of retained samples.
pub const DEFAULT_MAX_DATA_POINTS: usize = 100;

/// Default payload field holding the sample value.
pub const DEFAULT_VALUE_FIELD: &str = "value";

/// Metrics stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsStreamConfig {
    /// Channel to subscribe to.
    pub channel: String,

    /// Maximum retained samples.
    pub max_data_points: usize,

    /// Aggregation window in milliseconds; `None` retains raw samples.
    pub aggregation_window_ms: Option<u64>,

    /// Only accept points whose `metric` field equals this name.
    pub metric: Option<String>,

    /// Payload field holding the value.
    pub value_field: String,
}

impl Default for MetricsStreamConfig {
    fn default() -> Self {
        Self {
            channel: channels::METRICS.to_string(),
            max_data_points: DEFAULT_MAX_DATA_POINTS,
            aggregation_window_ms: None,
            metric: None,
            value_field: DEFAULT_VALUE_FIELD.to_string(),
        }
    }
}

impl MetricsStreamConfig {
    /// Creates a configuration for `channel`.
    #[must_use]
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Default::default()
        }
    }

    /// Sets the retention bound.
    #[must_use]
    pub fn with_max_data_points(mut self, max: usize) -> Self {
        self.max_data_points = max;
        self
    }

    /// Sets the aggregation window.
    #[must_use]
    pub fn with_aggregation_window(mut self, window: Duration) -> Self {
        self.aggregation_window_ms = Some(u64::try_from(window.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Restricts the stream to one metric name.
    #[must_use]
    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    /// Sets the payload field holding the value.
    #[must_use]
    pub fn with_value_field(mut self, field: impl Into<String>) -> Self {
        self.value_field = field.into();
        self
    }

    /// Returns the aggregation window.
    #[must_use]
    pub fn aggregation_window(&self) -> Option<Duration> {
        self.aggregation_window_ms.map(Duration::from_millis)
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
        if self.max_data_points == 0 {
            return Err(HookError::InvalidConfig(
                "max_data_points must be > 0".to_string(),
            ));
        }
        if self.aggregation_window_ms == Some(0) {
            return Err(HookError::InvalidConfig(
                "aggregation_window_ms must be > 0".to_string(),
            ));
        }
        if self.value_field.is_empty() {
            return Err(HookError::InvalidConfig(
                "value_field cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One retained sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Sample value, or the window mean when aggregated.
    pub value: f64,
    /// Number of raw values the sample represents.
    pub sample_count: usize,
}

/// Read-only view of a metrics stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Retained samples, oldest first.
    pub samples: Vec<MetricSample>,
    /// Most recent retained value.
    pub latest: Option<f64>,
    /// Trend between the two most recent retained values.
    pub trend: Option<Trend>,
    /// Values buffered for the current aggregation window.
    pub pending: usize,
    /// Last validation failure.
    pub error: Option<String>,
}

/// State machine behind [`MetricsStream`].
#[derive(Debug)]
pub struct MetricsState {
    config: MetricsStreamConfig,
    history: BoundedHistory<MetricSample>,
    buffer: Vec<(i64, f64)>,
    trend: Option<Trend>,
    error: Option<HookError>,
}

impl MetricsState {
    /// Creates an empty state.
    #[must_use]
    pub fn new(config: MetricsStreamConfig) -> Self {
        Self {
            history: BoundedHistory::new(config.max_data_points),
            buffer: Vec::new(),
            trend: None,
            error: None,
            config,
        }
    }

    /// Records a value observed at `timestamp`, bypassing payload parsing.
    pub fn push(&mut self, timestamp: i64, value: f64) {
        if self.config.aggregation_window_ms.is_some() {
            self.buffer.push((timestamp, value));
        } else {
            self.append(MetricSample {
                timestamp,
                value,
                sample_count: 1,
            });
        }
    }

    /// Collapses the buffered window into its mean and appends it.
    /// Returns the appended sample, if any values were buffered.
    pub fn flush(&mut self) -> Option<MetricSample> {
        let (last_timestamp, _) = *self.buffer.last()?;
        let count = self.buffer.len();
        let sum: f64 = self.buffer.iter().map(|(_, v)| v).sum();
        self.buffer.clear();

        let sample = MetricSample {
            timestamp: last_timestamp,
            value: sum / count as f64,
            sample_count: count,
        };
        self.append(sample);
        Some(sample)
    }

    fn append(&mut self, sample: MetricSample) {
        self.history.push_back(sample);
        self.trend = self
            .history
            .last_two()
            .map(|(previous, current)| Trend::between(previous.value, current.value));
    }

    /// Empties the history, the pending window, and the error state.
    pub fn clear(&mut self) {
        self.history.clear();
        self.buffer.clear();
        self.trend = None;
        self.error = None;
    }

    /// Returns the trend.
    #[must_use]
    pub fn trend(&self) -> Option<Trend> {
        self.trend
    }

    /// Returns a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples: self.history.to_vec(),
            latest: self.history.back().map(|s| s.value),
            trend: self.trend,
            pending: self.buffer.len(),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

impl HookState for MetricsState {
    fn apply(&mut self, point: &RealTimeDataPoint) -> Result<Applied, HookError> {
        // Only metric samples and KPI readings carry a numeric value.
        if !matches!(point.kind, DataPointType::Data | DataPointType::Kpi) {
            return Ok(Applied::Ignored);
        }
        if let Some(metric) = &self.config.metric {
            if point.str_field("metric") != Some(metric.as_str()) {
                return Ok(Applied::Ignored);
            }
        }

        let value = hook::number(point, &self.config.value_field)?;
        self.push(point.timestamp, value);
        Ok(Applied::Accepted)
    }

    fn error_slot(&mut self) -> &mut Option<HookError> {
        &mut self.error
    }
}

/// Metrics hook attached to a context.
#[derive(Debug)]
pub struct MetricsStream {
    attachment: Attachment<MetricsState>,
    flusher: Option<JoinHandle<()>>,
}

impl MetricsStream {
    /// Subscribes a new metrics stream to `config.channel`.
    ///
    /// With an aggregation window the stream flushes on a Tokio interval;
    /// outside a runtime windows only close through [`MetricsStream::flush`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn attach(context: &RealtimeContext, config: MetricsStreamConfig) -> Result<Self, HookError> {
        config.validate()?;

        let window = config.aggregation_window();
        let channel = config.channel.clone();
        let attachment = Attachment::new(context, &channel, MetricsState::new(config));

        let flusher = match window {
            Some(window) if tokio::runtime::Handle::try_current().is_ok() => Some(tokio::spawn(
                run_flusher(Arc::downgrade(attachment.shared()), window),
            )),
            Some(_) => {
                warn!("No Tokio runtime; aggregation on {} flushes manually", channel);
                None
            }
            None => None,
        };

        Ok(Self {
            attachment,
            flusher,
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
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.attachment.state().snapshot()
    }

    /// Closes the current aggregation window now.
    pub fn flush(&self) -> Option<MetricSample> {
        self.attachment.state().flush()
    }

    /// Empties the history.
    pub fn clear(&self) {
        self.attachment.state().clear();
    }

    /// Records a locally produced value.
    pub fn push(&self, value: f64) {
        self.attachment.state().push(now_millis(), value);
    }
}

impl Drop for MetricsStream {
    fn drop(&mut self) {
        if let Some(flusher) = self.flusher.take() {
            flusher.abort();
        }
    }
}

async fn run_flusher(state: Weak<Mutex<MetricsState>>, window: Duration) {
    let mut ticker = tokio::time::interval(window);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(state) = state.upgrade() else {
            break;
        };
        if let Some(sample) = lock(&state).flush() {
            debug!(
                "Aggregated {} value(s) into {}",
                sample.sample_count, sample.value
            );
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::TrendDirection;
    use serde_json::{json, Value};

    fn point(data: Value) -> RealTimeDataPoint {
        RealTimeDataPoint::new(
            1_700_000_000_000,
            DataPointType::Data,
            "sales",
            data.as_object().cloned().unwrap_or_default(),
        )
    }

    #[test]
    fn test_config_default() {
        let config = MetricsStreamConfig::default();
        assert_eq!(config.channel, "metrics");
        assert_eq!(config.max_data_points, DEFAULT_MAX_DATA_POINTS);
        assert!(config.aggregation_window().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialize() {
        let config: MetricsStreamConfig = serde_json::from_value(json!({
            "channel": "cpu",
            "maxDataPoints": 10,
            "aggregationWindowMs": 5000
        }))
        .expect("config");
        assert_eq!(config.channel, "cpu");
        assert_eq!(config.max_data_points, 10);
        assert_eq!(config.aggregation_window(), Some(Duration::from_secs(5)));
        assert_eq!(config.value_field, "value");
    }

    #[test]
    fn test_config_validate() {
        assert!(MetricsStreamConfig::default()
            .with_max_data_points(0)
            .validate()
            .is_err());
        assert!(MetricsStreamConfig::default()
            .with_aggregation_window(Duration::ZERO)
            .validate()
            .is_err());
        assert!(MetricsStreamConfig::new("").validate().is_err());
    }

    #[test]
    fn test_history_retains_last_points_in_order() {
        let mut state = MetricsState::new(MetricsStreamConfig::default().with_max_data_points(3));
        for (i, value) in [1.0, 2.0, 3.0, 4.0, 5.0].into_iter().enumerate() {
            state.push(i as i64, value);
        }

        let values: Vec<f64> = state.snapshot().samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_trend_follows_retained_values() {
        let mut state = MetricsState::new(MetricsStreamConfig::default());
        state.push(1, 100.0);
        assert!(state.trend().is_none());

        state.push(2, 150.0);
        let trend = state.trend().expect("trend");
        assert_eq!(trend.direction, TrendDirection::Up);
        assert!((trend.change_percent - 50.0).abs() < 1e-9);

        state.push(3, 100.0);
        let trend = state.trend().expect("trend");
        assert_eq!(trend.direction, TrendDirection::Down);
        assert!((trend.change_percent + 33.33).abs() < 0.01);
    }

    #[test]
    fn test_aggregation_collapses_window_to_mean() {
        let config = MetricsStreamConfig::default().with_aggregation_window(Duration::from_secs(1));
        let mut state = MetricsState::new(config);

        state.push(1, 10.0);
        state.push(2, 20.0);
        state.push(3, 30.0);
        assert!(state.snapshot().samples.is_empty());
        assert_eq!(state.snapshot().pending, 3);

        let sample = state.flush().expect("sample");
        assert_eq!(sample.value, 20.0);
        assert_eq!(sample.sample_count, 3);
        assert_eq!(sample.timestamp, 3);
        assert_eq!(state.snapshot().pending, 0);

        // An empty window appends nothing.
        assert!(state.flush().is_none());

        state.push(4, 40.0);
        state.flush();
        let trend = state.trend().expect("trend");
        assert_eq!(trend.direction, TrendDirection::Up);
        assert!((trend.change_absolute - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_numeric_value_sets_error() {
        let mut state = MetricsState::new(MetricsStreamConfig::default());

        assert_eq!(state.ingest(&point(json!({"value": "12"}))), Applied::Ignored);
        let snapshot = state.snapshot();
        assert!(snapshot.samples.is_empty());
        assert!(snapshot.error.is_some());

        assert_eq!(state.ingest(&point(json!({"value": 12}))), Applied::Accepted);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.latest, Some(12.0));
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_other_point_kinds_ignored() {
        let mut state = MetricsState::new(MetricsStreamConfig::default());

        for kind in [DataPointType::Health, DataPointType::Event, DataPointType::Alert] {
            let other = RealTimeDataPoint::new(
                1_700_000_000_000,
                kind,
                "inventory",
                json!({"status": "healthy"}).as_object().cloned().unwrap_or_default(),
            );
            assert_eq!(state.ingest(&other), Applied::Ignored);
        }

        let snapshot = state.snapshot();
        assert!(snapshot.samples.is_empty());
        assert_eq!(snapshot.pending, 0);
        assert!(snapshot.error.is_none());

        let kpi = RealTimeDataPoint::new(
            1_700_000_000_000,
            DataPointType::Kpi,
            "sales",
            json!({"value": 5}).as_object().cloned().unwrap_or_default(),
        );
        assert_eq!(state.ingest(&kpi), Applied::Accepted);
        assert_eq!(state.snapshot().latest, Some(5.0));
    }

    #[test]
    fn test_metric_filter_ignores_other_metrics() {
        let mut state = MetricsState::new(MetricsStreamConfig::default().with_metric("cpu"));

        state.ingest(&point(json!({"metric": "memory", "value": 70})));
        state.ingest(&point(json!({"metric": "cpu", "value": 40})));
        // Ignored points do not touch the error state.
        state.ingest(&point(json!({"metric": "memory", "value": "bad"})));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.latest, Some(40.0));
        assert_eq!(snapshot.samples.len(), 1);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_custom_value_field() {
        let mut state =
            MetricsState::new(MetricsStreamConfig::default().with_value_field("responseTime"));
        state.ingest(&point(json!({"responseTime": 120.5})));
        assert_eq!(state.snapshot().latest, Some(120.5));
    }

    #[test]
    fn test_clear() {
        let mut state = MetricsState::new(MetricsStreamConfig::default());
        state.push(1, 1.0);
        state.push(2, 2.0);
        state.clear();

        let snapshot = state.snapshot();
        assert!(snapshot.samples.is_empty());
        assert!(snapshot.trend.is_none());
    }
}
