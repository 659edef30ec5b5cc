//! Real-time client metrics.
//!
//! Provides atomic counters for monitoring the transport connection and
//! channel dispatch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for the real-time client.
#[derive(Debug)]
pub struct RealtimeMetrics {
    /// Inbound frames successfully decoded.
    messages_received: AtomicU64,

    /// Outbound frames handed to the socket.
    frames_sent: AtomicU64,

    /// Inbound frames that could not be decoded.
    decode_errors: AtomicU64,

    /// Socket-level errors and server error envelopes.
    socket_errors: AtomicU64,

    /// Consumer callbacks that panicked during dispatch.
    callback_failures: AtomicU64,

    /// `subscribe` envelopes sent.
    subscribes_sent: AtomicU64,

    /// `unsubscribe` envelopes sent.
    unsubscribes_sent: AtomicU64,

    /// Automatic reconnection attempts scheduled.
    reconnect_attempts: AtomicU64,

    /// Start time for rate calculation.
    start_time: Instant,
}

impl Default for RealtimeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            socket_errors: AtomicU64::new(0),
            callback_failures: AtomicU64::new(0),
            subscribes_sent: AtomicU64::new(0),
            unsubscribes_sent: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a decoded inbound message.
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an outbound frame.
    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a frame that failed to decode.
    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a socket or server error.
    pub fn record_socket_error(&self) {
        self.socket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a panicking consumer callback.
    pub fn record_callback_failure(&self) {
        self.callback_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a `subscribe` envelope sent.
    pub fn record_subscribe_sent(&self) {
        self.subscribes_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an `unsubscribe` envelope sent.
    pub fn record_unsubscribe_sent(&self) {
        self.unsubscribes_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a scheduled reconnection attempt.
    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns decoded inbound messages.
    #[must_use]
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Returns outbound frames.
    #[must_use]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Returns decode errors.
    #[must_use]
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Returns socket and server errors.
    #[must_use]
    pub fn socket_errors(&self) -> u64 {
        self.socket_errors.load(Ordering::Relaxed)
    }

    /// Returns the total error count (decode plus socket errors).
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.decode_errors() + self.socket_errors()
    }

    /// Returns panicking callbacks.
    #[must_use]
    pub fn callback_failures(&self) -> u64 {
        self.callback_failures.load(Ordering::Relaxed)
    }

    /// Returns `subscribe` envelopes sent.
    #[must_use]
    pub fn subscribes_sent(&self) -> u64 {
        self.subscribes_sent.load(Ordering::Relaxed)
    }

    /// Returns `unsubscribe` envelopes sent.
    #[must_use]
    pub fn unsubscribes_sent(&self) -> u64 {
        self.unsubscribes_sent.load(Ordering::Relaxed)
    }

    /// Returns scheduled reconnection attempts.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Returns the uptime.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns inbound messages per second.
    #[must_use]
    pub fn messages_per_second(&self) -> f64 {
        let elapsed = self.uptime().as_secs_f64();
        if elapsed > 0.0 {
            self.messages_received() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Returns a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> RealtimeMetricsSnapshot {
        RealtimeMetricsSnapshot {
            messages_received: self.messages_received(),
            frames_sent: self.frames_sent(),
            decode_errors: self.decode_errors(),
            socket_errors: self.socket_errors(),
            callback_failures: self.callback_failures(),
            subscribes_sent: self.subscribes_sent(),
            unsubscribes_sent: self.unsubscribes_sent(),
            reconnect_attempts: self.reconnect_attempts(),
            uptime: self.uptime(),
            messages_per_second: self.messages_per_second(),
        }
    }
}

/// A point-in-time snapshot of real-time client metrics.
#[derive(Debug, Clone)]
pub struct RealtimeMetricsSnapshot {
    /// Decoded inbound messages.
    pub messages_received: u64,
    /// Outbound frames.
    pub frames_sent: u64,
    /// Decode errors.
    pub decode_errors: u64,
    /// Socket and server errors.
    pub socket_errors: u64,
    /// Panicking callbacks.
    pub callback_failures: u64,
    /// `subscribe` envelopes sent.
    pub subscribes_sent: u64,
    /// `unsubscribe` envelopes sent.
    pub unsubscribes_sent: u64,
    /// Scheduled reconnection attempts.
    pub reconnect_attempts: u64,
    /// Uptime.
    pub uptime: Duration,
    /// Inbound messages per second.
    pub messages_per_second: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = RealtimeMetrics::new();
        assert_eq!(metrics.messages_received(), 0);
        assert_eq!(metrics.errors(), 0);
        assert_eq!(metrics.reconnect_attempts(), 0);
    }

    #[test]
    fn test_metrics_errors_sum() {
        let metrics = RealtimeMetrics::default();

        metrics.record_decode_error();
        metrics.record_socket_error();
        metrics.record_socket_error();

        assert_eq!(metrics.decode_errors(), 1);
        assert_eq!(metrics.socket_errors(), 2);
        assert_eq!(metrics.errors(), 3);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = RealtimeMetrics::new();

        metrics.record_message_received();
        metrics.record_frame_sent();
        metrics.record_subscribe_sent();
        metrics.record_unsubscribe_sent();
        metrics.record_callback_failure();

        let snapshot = metrics.snapshot();

        assert_eq!(snapshot.messages_received, 1);
        assert_eq!(snapshot.frames_sent, 1);
        assert_eq!(snapshot.subscribes_sent, 1);
        assert_eq!(snapshot.unsubscribes_sent, 1);
        assert_eq!(snapshot.callback_failures, 1);
    }
}
