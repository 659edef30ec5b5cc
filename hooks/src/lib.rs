//! Pulseboard consumer hooks.
//!
//! Each hook subscribes to one channel of a [`RealtimeContext`], keeps its
//! own bounded state, and exposes a read-only snapshot plus its mutators.
//! Dropping a hook detaches it.
//!
//! # Hooks
//!
//! - [`MetricsStream`] — Numeric samples, optional windowed aggregation, trend
//! - [`AlertFeed`] — Newest-first alerts with acknowledgement
//! - [`EventFeed`] — Newest-first business events
//! - [`KpiBoard`] — Latest-wins KPIs
//! - [`DomainHealthMonitor`] — Latest health report per domain
//!
//! The state machine behind each hook (`MetricsState`, `AlertState`, ...)
//! works without a context.

pub mod alerts;
pub mod error;
pub mod events;
pub mod health;
pub mod history;
pub mod hook;
pub mod kpis;
pub mod metrics;

pub use alerts::{Alert, AlertFeed, AlertFeedConfig, AlertSeverity, AlertSnapshot, AlertState};
pub use error::HookError;
pub use events::{EventFeed, EventFeedConfig, EventRecord, EventSnapshot, EventState};
pub use health::{
    DomainHealth, DomainHealthMonitor, HealthMonitorConfig, HealthSnapshot, HealthState,
    HealthStatus,
};
pub use history::{BoundedHistory, Trend, TrendDirection};
pub use hook::{Applied, HookState};
pub use kpis::{Kpi, KpiBoard, KpiBoardConfig, KpiSnapshot, KpiState};
pub use metrics::{MetricSample, MetricsSnapshot, MetricsState, MetricsStream, MetricsStreamConfig};

pub use pulseboard_realtime::RealtimeContext;
