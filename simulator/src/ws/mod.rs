//! WebSocket server for simulated dashboard clients.
//!
//! # Protocol
//!
//! - `subscribe` / `unsubscribe` — answered with `subscribed` / `unsubscribed`
//! - `ping` — answered with `pong`
//! - `publish` — echoed as `data` when the session is subscribed
//! - anything else — answered with `error`
//!
//! Subscribed sessions receive one `data` frame per channel per tick.

pub mod channels;
pub mod handler;
pub mod metrics;

pub use channels::ChannelDirectory;
pub use handler::{ws_handler, SimulatorState};
pub use metrics::{SimulatorMetrics, SimulatorMetricsSnapshot};
