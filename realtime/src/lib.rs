//! Pulseboard real-time client.
//!
//! This crate keeps a dashboard connected to its data-distribution endpoint
//! and fans incoming data points out to in-process subscribers.
//!
//! # Components
//!
//! - [`RealtimeContext`] — Transport connection plus channel registry
//! - [`Subscription`] — Guard for one registered callback
//! - [`ChannelRegistry`] — Channel name to callbacks
//! - [`Envelope`] — Wire message
//! - [`RealTimeDataPoint`] — Payload delivered to subscribers
//! - [`Connector`] — Socket factory; [`TungsteniteConnector`] in production
//!
//! # Example
//!
//! ```rust,no_run
//! use pulseboard_realtime::{RealtimeConfig, RealtimeContext};
//!
//! # async fn run() -> Result<(), pulseboard_realtime::RealtimeError> {
//! let context = RealtimeContext::new(RealtimeConfig::default())?;
//! context.connect();
//!
//! let _kpis = context.subscribe("kpis", |point| {
//!     println!("{} {:?}", point.domain, point.data);
//! });
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod event;
pub mod metrics;
pub mod registry;
pub mod socket;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{ConfigError, RealtimeConfig};
pub use context::{RealtimeContext, Subscription};
pub use envelope::{now_millis, Envelope, EnvelopeType};
pub use error::RealtimeError;
pub use event::{DataPointMetadata, DataPointType, Priority, RealTimeDataPoint};
pub use metrics::{RealtimeMetrics, RealtimeMetricsSnapshot};
pub use registry::{Callback, ChannelRegistry, SubscriberId};
pub use socket::{Connector, OutboundFrame, SocketEvent, SocketHandle, TungsteniteConnector};
pub use state::{ConnectionState, ConnectionStatus};

/// Standard dashboard channel names.
pub mod channels {
    /// Time-series metric samples.
    pub const METRICS: &str = "metrics";
    /// Alerts.
    pub const ALERTS: &str = "alerts";
    /// Business events.
    pub const EVENTS: &str = "events";
    /// Key performance indicators.
    pub const KPIS: &str = "kpis";
    /// Per-domain health.
    pub const HEALTH: &str = "health";

    /// All standard channels.
    pub const ALL: [&str; 5] = [METRICS, ALERTS, EVENTS, KPIS, HEALTH];
}
