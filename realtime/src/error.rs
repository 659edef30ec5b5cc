//! Real-time client error types.
//!
//! Errors never cross into the consumer layer as panics; the context turns
//! them into connection state. These types are used at the seams where a
//! caller can still act on a failure (configuration, codecs, connectors).

use crate::config::ConfigError;

/// Real-time client errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// WebSocket protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Failed to serialize an envelope.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to decode an inbound frame.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
