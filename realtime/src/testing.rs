//! Test doubles for the socket layer.
//!
//! [`MockConnector`] hands out scripted sockets: tests drive the lifecycle
//! (`open`, inbound frames, failures, closes) and inspect the frames the
//! context wrote.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::event::RealTimeDataPoint;
use crate::socket::{Connector, OutboundFrame, SocketEvent, SocketHandle};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connector that records every socket it opens.
#[derive(Debug, Default)]
pub struct MockConnector {
    sockets: Mutex<Vec<Arc<MockSocket>>>,
}

impl MockConnector {
    /// Creates a new connector.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the socket opened at `index`.
    #[must_use]
    pub fn socket(&self, index: usize) -> Option<Arc<MockSocket>> {
        lock(&self.sockets).get(index).cloned()
    }

    /// Returns the most recently opened socket.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<MockSocket>> {
        lock(&self.sockets).last().cloned()
    }

    /// Returns how many sockets have been opened.
    #[must_use]
    pub fn open_count(&self) -> usize {
        lock(&self.sockets).len()
    }
}

impl Connector for MockConnector {
    fn open(&self, url: &str) -> SocketHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        lock(&self.sockets).push(Arc::new(MockSocket {
            url: url.to_string(),
            events: events_tx,
            outbound: Mutex::new(outbound_rx),
            history: Mutex::new(Vec::new()),
        }));

        SocketHandle {
            outbound: outbound_tx,
            events: events_rx,
        }
    }
}

/// Server side of a scripted socket.
#[derive(Debug)]
pub struct MockSocket {
    url: String,
    events: mpsc::UnboundedSender<SocketEvent>,
    outbound: Mutex<mpsc::UnboundedReceiver<OutboundFrame>>,
    history: Mutex<Vec<OutboundFrame>>,
}

impl MockSocket {
    /// Returns the URL the socket was opened with.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Completes the opening handshake.
    pub fn open(&self) {
        self.emit(SocketEvent::Open);
    }

    /// Delivers a raw text frame.
    pub fn send_text(&self, text: impl Into<String>) {
        self.emit(SocketEvent::Message(text.into()));
    }

    /// Delivers an envelope.
    pub fn send_envelope(&self, envelope: &Envelope) {
        if let Ok(text) = envelope.encode() {
            self.send_text(text);
        }
    }

    /// Delivers a data point on `channel`.
    pub fn send_data(&self, channel: &str, point: &RealTimeDataPoint) {
        if let Ok(payload) = point.to_value() {
            self.send_envelope(&Envelope::data(channel, payload));
        }
    }

    /// Reports a socket failure.
    pub fn fail(&self, message: impl Into<String>) {
        self.emit(SocketEvent::Error(message.into()));
    }

    /// Closes the socket from the server side.
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        self.emit(SocketEvent::Close {
            code,
            reason: reason.into(),
        });
    }

    /// Returns every frame the client has written so far.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<OutboundFrame> {
        let mut history = lock(&self.history);
        let mut outbound = lock(&self.outbound);
        while let Ok(frame) = outbound.try_recv() {
            history.push(frame);
        }
        history.clone()
    }

    /// Returns every decodable text frame the client has written so far.
    #[must_use]
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent_frames()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Text(text) => Envelope::decode(&text).ok(),
                OutboundFrame::Close { .. } => None,
            })
            .collect()
    }

    fn emit(&self, event: SocketEvent) {
        // The context drops receivers of superseded sockets.
        let _ = self.events.send(event);
    }
}

/// Lets spawned tasks drain pending socket events.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
