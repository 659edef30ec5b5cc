//! Connection state observed by consumers.

use serde::{Deserialize, Serialize};

/// Lifecycle status of the transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No connection and none being opened.
    #[default]
    Disconnected,
    /// A socket is being opened.
    Connecting,
    /// The socket is open.
    Connected,
    /// The last socket failed; recovery may be pending.
    Error,
}

impl ConnectionStatus {
    /// Returns true if connected.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Read-only snapshot of the connection's health.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    /// Current status.
    pub status: ConnectionStatus,

    /// When the connection last reached `connected`, in epoch milliseconds.
    pub last_connected: Option<i64>,

    /// Cumulative decoded messages.
    pub message_count: u64,

    /// Cumulative errors (socket, server, and decode).
    pub error_count: u64,

    /// Most recent error message.
    pub last_error: Option<String>,

    /// Current automatic reconnection attempt (0 once connected).
    pub reconnect_attempt: u32,
}

impl ConnectionState {
    /// Returns true if connected.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.status.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_default_disconnected() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
        assert!(!ConnectionState::default().is_connected());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let state = ConnectionState {
            status: ConnectionStatus::Connected,
            last_connected: Some(10),
            message_count: 3,
            ..Default::default()
        };
        let json = serde_json::to_string(&state).expect("serialize");
        assert!(json.contains("\"status\":\"connected\""));
        assert!(json.contains("\"lastConnected\":10"));
        assert!(json.contains("\"messageCount\":3"));
    }
}
