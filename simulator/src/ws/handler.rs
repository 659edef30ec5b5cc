//! WebSocket connection handler.
//!
//! Upgrades dashboard clients and drives one [`SimulatorSession`] per
//! connection: client frames are answered as they arrive and generated data
//! is pushed on every tick.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use pulseboard_realtime::{Envelope, EnvelopeType};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::channels::ChannelDirectory;
use super::metrics::SimulatorMetrics;
use crate::config::SimulatorConfig;
use crate::session::SimulatorSession;

/// State shared across connections.
#[derive(Debug, Clone)]
pub struct SimulatorState {
    /// Channel directory.
    pub channels: Arc<ChannelDirectory>,
    /// Metrics.
    pub metrics: Arc<SimulatorMetrics>,
    /// Interval between generated data frames.
    pub tick_interval: Duration,
}

impl SimulatorState {
    /// Creates the shared state.
    #[must_use]
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            channels: Arc::new(ChannelDirectory::new()),
            metrics: Arc::new(SimulatorMetrics::new()),
            tick_interval: config.tick_interval,
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SimulatorState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

/// Handles a WebSocket connection.
async fn handle_connection(socket: WebSocket, state: SimulatorState) {
    state.metrics.record_session_opened();
    let mut session = SimulatorSession::new();
    let session_id = session.id();
    info!("Session {} opened", session_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<Envelope>(100);

    // Forward replies and generated frames to the socket.
    let metrics = Arc::clone(&state.metrics);
    let sender_task = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let json = match envelope.encode() {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize envelope: {}", e);
                    continue;
                }
            };

            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
            metrics.record_frame_sent();
        }
    });

    let mut ticker = tokio::time::interval(state.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                let msg = match incoming {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        warn!("WebSocket error on session {}: {}", session_id, e);
                        state.metrics.record_error();
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        state.metrics.record_frame_received();
                        let replies = session.handle_text(text.as_str());
                        if !deliver(&tx, &state, session_id, replies).await {
                            break;
                        }
                    }
                    Message::Close(_) => {
                        info!("Session {} requested close", session_id);
                        break;
                    }
                    _ => {}
                }
            }
            _ = ticker.tick() => {
                let frames = session.tick();
                for _ in &frames {
                    state.metrics.record_data_frame();
                }
                if !deliver(&tx, &state, session_id, frames).await {
                    break;
                }
            }
        }
    }

    // Cleanup
    state.channels.unsubscribe_all(session_id).await;
    state.metrics.record_session_closed();
    sender_task.abort();

    info!("Session {} closed", session_id);
}

/// Queues frames for a session and applies the directory bookkeeping the
/// replies imply. Returns false once the session's writer has gone away.
async fn deliver(
    tx: &mpsc::Sender<Envelope>,
    state: &SimulatorState,
    session_id: u64,
    frames: Vec<Envelope>,
) -> bool {
    for envelope in frames {
        state.metrics.record_reply(&envelope);
        match (envelope.kind, envelope.channel()) {
            (EnvelopeType::Subscribed, Some(channel)) => {
                state.channels.subscribe(channel, session_id).await;
            }
            (EnvelopeType::Unsubscribed, Some(channel)) => {
                state.channels.unsubscribe(channel, session_id).await;
            }
            _ => {}
        }

        if tx.send(envelope).await.is_err() {
            debug!("Session {} writer closed", session_id);
            return false;
        }
    }
    true
}
