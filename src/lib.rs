//! Pulseboard: live dashboard data over WebSocket.
//!
//! This facade re-exports the workspace crates:
//!
//! - [`realtime`] — Connection lifecycle and channel fan-out
//! - [`hooks`] — Bounded, derived views over individual channels
//! - [`simulator`] — Development server and in-process loopback
//!
//! # Example
//!
//! ```rust,no_run
//! use pulseboard::hooks::{KpiBoard, KpiBoardConfig};
//! use pulseboard::realtime::{RealtimeConfig, RealtimeContext};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let context = RealtimeContext::new(RealtimeConfig::default())?;
//! let board = KpiBoard::attach(&context, KpiBoardConfig::default())?;
//! context.connect();
//!
//! for kpi in board.snapshot().kpis {
//!     println!("{} = {}", kpi.id, kpi.value);
//! }
//! # Ok(())
//! # }
//! ```

pub use pulseboard_hooks as hooks;
pub use pulseboard_realtime as realtime;
pub use pulseboard_simulator as simulator;

pub use pulseboard_hooks::{
    AlertFeed, DomainHealthMonitor, EventFeed, KpiBoard, MetricsStream,
};
pub use pulseboard_realtime::{
    ConnectionStatus, RealTimeDataPoint, RealtimeConfig, RealtimeContext, RealtimeError,
    Subscription,
};
