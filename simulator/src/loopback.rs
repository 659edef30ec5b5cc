//! In-process connector.
//!
//! [`LoopbackConnector`] plugs a [`SimulatorSession`] straight into a
//! `RealtimeContext`: no network, same protocol. Useful for demos and for
//! exercising the client end to end in tests.

use std::sync::Arc;
use std::time::Duration;

use pulseboard_realtime::{
    Connector, Envelope, EnvelopeType, OutboundFrame, SocketEvent, SocketHandle,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::config::DEFAULT_TICK_MS;
use crate::session::SimulatorSession;
use crate::ws::SimulatorMetrics;

/// Connector whose sockets are simulator sessions running on the local
/// Tokio runtime.
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    tick_interval: Duration,
    metrics: Arc<SimulatorMetrics>,
}

impl Default for LoopbackConnector {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TICK_MS))
    }
}

impl LoopbackConnector {
    /// Creates a connector whose sessions tick every `tick_interval`.
    #[must_use]
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            tick_interval,
            metrics: Arc::new(SimulatorMetrics::new()),
        }
    }

    /// Returns the metrics shared by every session this connector opens.
    #[must_use]
    pub fn metrics(&self) -> Arc<SimulatorMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Connector for LoopbackConnector {
    fn open(&self, url: &str) -> SocketHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        debug!("Opening loopback session for {}", url);
        tokio::spawn(run_session(
            self.tick_interval,
            Arc::clone(&self.metrics),
            outbound_rx,
            events_tx,
        ));

        SocketHandle {
            outbound: outbound_tx,
            events: events_rx,
        }
    }
}

async fn run_session(
    tick_interval: Duration,
    metrics: Arc<SimulatorMetrics>,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    events: mpsc::UnboundedSender<SocketEvent>,
) {
    metrics.record_session_opened();
    let mut session = SimulatorSession::new();

    if events.send(SocketEvent::Open).is_ok() {
        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            tokio::select! {
                frame = outbound.recv() => match frame {
                    Some(OutboundFrame::Text(text)) => {
                        metrics.record_frame_received();
                        let replies = session.handle_text(&text);
                        if !emit(&events, &metrics, replies) {
                            break;
                        }
                    }
                    Some(OutboundFrame::Close { code, reason }) => {
                        let _ = events.send(SocketEvent::Close { code, reason });
                        break;
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    let frames = session.tick();
                    if !emit(&events, &metrics, frames) {
                        break;
                    }
                }
            }
        }
    }

    debug!("Loopback session {} closed", session.id());
    metrics.record_session_closed();
}

fn emit(
    events: &mpsc::UnboundedSender<SocketEvent>,
    metrics: &SimulatorMetrics,
    frames: Vec<Envelope>,
) -> bool {
    for envelope in frames {
        metrics.record_reply(&envelope);
        if envelope.kind == EnvelopeType::Data {
            metrics.record_data_frame();
        }

        let text = match envelope.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode loopback frame: {}", e);
                continue;
            }
        };
        if events.send(SocketEvent::Message(text)).is_err() {
            return false;
        }
        metrics.record_frame_sent();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pulseboard_realtime::{RealtimeConfig, RealtimeContext};

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loopback_streams_subscribed_channels() {
        let connector = LoopbackConnector::new(Duration::from_millis(100));
        let metrics = connector.metrics();
        let ctx = RealtimeContext::with_connector(
            RealtimeConfig::default(),
            Arc::new(connector) as Arc<dyn Connector>,
        )
        .expect("context");

        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        let _sub = ctx.subscribe("metrics", move |point| {
            assert_eq!(point.domain, "system");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        ctx.connect();
        settle().await;
        assert!(ctx.is_connected());

        tokio::time::sleep(Duration::from_millis(350)).await;
        settle().await;

        assert_eq!(received.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.subscriptions(), 1);
        assert_eq!(metrics.data_frames(), 3);
        assert_eq!(ctx.error_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loopback_publish_echo_and_disconnect() {
        let connector = LoopbackConnector::new(Duration::from_secs(3600));
        let metrics = connector.metrics();
        let ctx = RealtimeContext::with_connector(
            RealtimeConfig::default(),
            Arc::new(connector) as Arc<dyn Connector>,
        )
        .expect("context");

        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);
        let _sub = ctx.subscribe("events", move |point| {
            assert_eq!(point.domain, "ui");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        ctx.connect();
        settle().await;

        let echo = serde_json::json!({
            "timestamp": 1,
            "type": "event",
            "domain": "ui",
            "data": {"eventType": "refresh"}
        });
        assert!(ctx.publish("events", echo));
        settle().await;
        assert_eq!(received.load(Ordering::SeqCst), 1);

        ctx.disconnect();
        settle().await;
        assert_eq!(metrics.active_sessions(), 0);
        assert_eq!(metrics.sessions_opened(), 1);
    }
}
