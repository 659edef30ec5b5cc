//! Server-side protocol state for one simulated client.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use pulseboard_realtime::{Envelope, EnvelopeType};
use tracing::{debug, warn};

use crate::generator::PayloadGenerator;

static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique session id.
#[must_use]
pub fn next_session_id() -> u64 {
    SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Protocol state of one client: its subscriptions and payload generator.
#[derive(Debug)]
pub struct SimulatorSession {
    id: u64,
    subscriptions: BTreeSet<String>,
    generator: PayloadGenerator,
}

impl Default for SimulatorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorSession {
    /// Creates a session with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: next_session_id(),
            subscriptions: BTreeSet::new(),
            generator: PayloadGenerator::new(),
        }
    }

    /// Returns the session id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns true if subscribed to `channel`.
    #[must_use]
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.contains(channel)
    }

    /// Returns the subscribed channels in order.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    /// Handles one client frame and returns the replies.
    pub fn handle_text(&mut self, text: &str) -> Vec<Envelope> {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Session {} sent an invalid frame: {}", self.id, e);
                return vec![Envelope::error(format!("invalid envelope: {}", e))];
            }
        };
        self.handle(envelope)
    }

    /// Handles one decoded client envelope and returns the replies.
    pub fn handle(&mut self, envelope: Envelope) -> Vec<Envelope> {
        match envelope.kind {
            EnvelopeType::Ping => vec![Envelope::pong()],
            EnvelopeType::Subscribe => match envelope.channel {
                Some(channel) => {
                    debug!("Session {} subscribed to {}", self.id, channel);
                    self.subscriptions.insert(channel.clone());
                    vec![Envelope::subscribed(channel)]
                }
                None => vec![Envelope::error("subscribe requires a channel")],
            },
            EnvelopeType::Unsubscribe => match envelope.channel {
                Some(channel) => {
                    debug!("Session {} unsubscribed from {}", self.id, channel);
                    self.subscriptions.remove(&channel);
                    vec![Envelope::unsubscribed(channel)]
                }
                None => vec![Envelope::error("unsubscribe requires a channel")],
            },
            EnvelopeType::Publish => match (envelope.channel, envelope.data) {
                (Some(channel), Some(data)) => {
                    if self.subscriptions.contains(&channel) {
                        vec![Envelope::data(channel, data)]
                    } else {
                        Vec::new()
                    }
                }
                _ => vec![Envelope::error("publish requires a channel and data")],
            },
            other => vec![Envelope::error(format!(
                "unexpected {} envelope from client",
                other
            ))],
        }
    }

    /// Advances the generator and returns one data frame per subscribed
    /// channel that has something to emit.
    pub fn tick(&mut self) -> Vec<Envelope> {
        self.generator.advance();

        let mut frames = Vec::new();
        for channel in &self.subscriptions {
            let Some(point) = self.generator.point(channel) else {
                continue;
            };
            match point.to_value() {
                Ok(payload) => frames.push(Envelope::data(channel.as_str(), payload)),
                Err(e) => warn!("Failed to encode point for {}: {}", channel, e),
            }
        }
        frames
    }
}
