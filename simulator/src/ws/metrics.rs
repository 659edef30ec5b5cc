//! Simulator metrics.
//!
//! Atomic counters for simulated client sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use pulseboard_realtime::{Envelope, EnvelopeType};

/// Metrics for the simulator.
#[derive(Debug)]
pub struct SimulatorMetrics {
    /// Sessions opened.
    sessions_opened: AtomicU64,

    /// Sessions closed.
    sessions_closed: AtomicU64,

    /// Frames received from clients.
    frames_received: AtomicU64,

    /// Frames sent to clients.
    frames_sent: AtomicU64,

    /// Data frames generated by ticks.
    data_frames: AtomicU64,

    /// Errors, including error replies.
    errors: AtomicU64,

    /// Subscriptions accepted.
    subscriptions: AtomicU64,

    /// Unsubscriptions accepted.
    unsubscriptions: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for SimulatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions_opened: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            data_frames: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            subscriptions: AtomicU64::new(0),
            unsubscriptions: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a session opened.
    pub fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a session closed.
    pub fn record_session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a client frame.
    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a frame sent to a client.
    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a generated data frame.
    pub fn record_data_frame(&self) {
        self.data_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a subscription.
    pub fn record_subscription(&self) {
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an unsubscription.
    pub fn record_unsubscription(&self) {
        self.unsubscriptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the bookkeeping implied by a reply sent to a client.
    pub fn record_reply(&self, reply: &Envelope) {
        match reply.kind {
            EnvelopeType::Subscribed => self.record_subscription(),
            EnvelopeType::Unsubscribed => self.record_unsubscription(),
            EnvelopeType::Error => self.record_error(),
            _ => {}
        }
    }

    /// Returns the sessions opened.
    #[must_use]
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened.load(Ordering::Relaxed)
    }

    /// Returns the sessions closed.
    #[must_use]
    pub fn sessions_closed(&self) -> u64 {
        self.sessions_closed.load(Ordering::Relaxed)
    }

    /// Returns the sessions currently open.
    #[must_use]
    pub fn active_sessions(&self) -> u64 {
        self.sessions_opened()
            .saturating_sub(self.sessions_closed())
    }

    /// Returns the frames received.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Returns the frames sent.
    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Returns the generated data frames.
    #[must_use]
    pub fn data_frames(&self) -> u64 {
        self.data_frames.load(Ordering::Relaxed)
    }

    /// Returns the errors.
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Returns the subscriptions.
    #[must_use]
    pub fn subscriptions(&self) -> u64 {
        self.subscriptions.load(Ordering::Relaxed)
    }

    /// Returns the unsubscriptions.
    #[must_use]
    pub fn unsubscriptions(&self) -> u64 {
        self.unsubscriptions.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> SimulatorMetricsSnapshot {
        SimulatorMetricsSnapshot {
            sessions_opened: self.sessions_opened(),
            sessions_closed: self.sessions_closed(),
            active_sessions: self.active_sessions(),
            frames_received: self.frames_received(),
            frames_sent: self.frames_sent(),
            data_frames: self.data_frames(),
            errors: self.errors(),
            subscriptions: self.subscriptions(),
            unsubscriptions: self.unsubscriptions(),
            uptime_secs: self.uptime().as_secs(),
        }
    }
}

/// A point-in-time snapshot of simulator metrics.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorMetricsSnapshot {
    /// Sessions opened.
    pub sessions_opened: u64,
    /// Sessions closed.
    pub sessions_closed: u64,
    /// Sessions currently open.
    pub active_sessions: u64,
    /// Frames received.
    pub frames_received: u64,
    /// Frames sent.
    pub frames_sent: u64,
    /// Generated data frames.
    pub data_frames: u64,
    /// Errors.
    pub errors: u64,
    /// Subscriptions.
    pub subscriptions: u64,
    /// Unsubscriptions.
    pub unsubscriptions: u64,
    /// Uptime in seconds.
    pub uptime_secs: u64,
}
