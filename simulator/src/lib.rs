//! Pulseboard development simulator.
//!
//! Serves the dashboard WebSocket protocol with generated data so the
//! real-time client can be exercised without a production backend.
//!
//! # Components
//!
//! - [`PayloadGenerator`] — Deterministic data points per channel
//! - [`SimulatorSession`] — Protocol state for one connected client
//! - [`server`] — Axum router and `serve` entry point
//! - [`LoopbackConnector`] — Runs sessions in-process behind a `RealtimeContext`

pub mod config;
pub mod error;
pub mod generator;
pub mod loopback;
pub mod server;
pub mod session;
pub mod ws;

pub use config::{SimulatorConfig, DASHBOARD_PATH};
pub use error::SimulatorError;
pub use generator::PayloadGenerator;
pub use loopback::LoopbackConnector;
pub use server::{build_router, serve};
pub use session::SimulatorSession;
pub use ws::{SimulatorMetrics, SimulatorMetricsSnapshot, SimulatorState};
