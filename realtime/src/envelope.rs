//! Wire envelope codec.
//!
//! Every frame on the connection, in both directions, is one UTF-8 JSON
//! envelope. Only `data` envelopes carry consumer payloads; everything else
//! is connection-management traffic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RealtimeError;

/// Envelope type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeType {
    /// Heartbeat request (client to server).
    Ping,
    /// Heartbeat response (server to client).
    Pong,
    /// Channel subscription request.
    Subscribe,
    /// Channel unsubscription request.
    Unsubscribe,
    /// Client publication to a channel.
    Publish,
    /// Channel data (server to client).
    Data,
    /// Server-side error report.
    Error,
    /// Subscription acknowledgement.
    Subscribed,
    /// Unsubscription acknowledgement.
    Unsubscribed,
}

impl std::fmt::Display for EnvelopeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Publish => "publish",
            Self::Data => "data",
            Self::Error => "error",
            Self::Subscribed => "subscribed",
            Self::Unsubscribed => "unsubscribed",
        };
        f.write_str(name)
    }
}

/// A single wire-level message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: EnvelopeType,

    /// Channel name, for channel-scoped messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Milliseconds since the Unix epoch. Fractional values on the wire are
    /// rounded.
    #[serde(default, deserialize_with = "deserialize_millis")]
    pub timestamp: i64,

    /// Error message, for `error` envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    fn new(kind: EnvelopeType) -> Self {
        Self {
            kind,
            channel: None,
            data: None,
            timestamp: now_millis(),
            error: None,
        }
    }

    fn for_channel(kind: EnvelopeType, channel: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            ..Self::new(kind)
        }
    }

    /// Creates a heartbeat ping.
    #[must_use]
    pub fn ping() -> Self {
        Self::new(EnvelopeType::Ping)
    }

    /// Creates a heartbeat pong.
    #[must_use]
    pub fn pong() -> Self {
        Self::new(EnvelopeType::Pong)
    }

    /// Creates a subscribe request.
    #[must_use]
    pub fn subscribe(channel: impl Into<String>) -> Self {
        Self::for_channel(EnvelopeType::Subscribe, channel)
    }

    /// Creates an unsubscribe request.
    #[must_use]
    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        Self::for_channel(EnvelopeType::Unsubscribe, channel)
    }

    /// Creates a publish request.
    #[must_use]
    pub fn publish(channel: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::for_channel(EnvelopeType::Publish, channel)
        }
    }

    /// Creates a data message.
    #[must_use]
    pub fn data(channel: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::for_channel(EnvelopeType::Data, channel)
        }
    }

    /// Creates a subscription acknowledgement.
    #[must_use]
    pub fn subscribed(channel: impl Into<String>) -> Self {
        Self::for_channel(EnvelopeType::Subscribed, channel)
    }

    /// Creates an unsubscription acknowledgement.
    #[must_use]
    pub fn unsubscribed(channel: impl Into<String>) -> Self {
        Self::for_channel(EnvelopeType::Unsubscribed, channel)
    }

    /// Creates an error report.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(EnvelopeType::Error)
        }
    }

    /// Returns the channel name, if any.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Encodes the envelope as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String, RealtimeError> {
        serde_json::to_string(self).map_err(|e| RealtimeError::Serialization(e.to_string()))
    }

    /// Decodes a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not valid JSON or does not match the
    /// envelope schema.
    pub fn decode(text: &str) -> Result<Self, RealtimeError> {
        serde_json::from_str(text).map_err(|e| RealtimeError::Deserialization(e.to_string()))
    }
}

/// Reads an epoch-millisecond timestamp from any JSON number.
pub(crate) fn deserialize_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(millis) = number.as_i64() {
        return Ok(millis);
    }
    match number.as_f64() {
        Some(millis) if millis.is_finite() && millis.abs() < i64::MAX as f64 => {
            Ok(millis.round() as i64)
        }
        _ => Err(serde::de::Error::custom(format!(
            "timestamp out of range: {}",
            number
        ))),
    }
}

/// Returns the current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_serialize() {
        let json = Envelope::subscribe("kpis").encode().expect("encode");
        assert!(json.contains("\"type\":\"subscribe\""));
        assert!(json.contains("\"channel\":\"kpis\""));
        assert!(json.contains("\"timestamp\":"));
        assert!(!json.contains("\"data\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_ping_has_no_channel() {
        let env = Envelope::ping();
        assert_eq!(env.kind, EnvelopeType::Ping);
        assert!(env.channel().is_none());
        assert!(env.timestamp > 0);
    }

    #[test]
    fn test_publish_carries_data() {
        let env = Envelope::publish("events", json!({"action": "refresh"}));
        let json = env.encode().expect("encode");
        assert!(json.contains("\"type\":\"publish\""));
        assert!(json.contains("\"action\":\"refresh\""));
    }

    #[test]
    fn test_decode_data() {
        let text = r#"{"type":"data","channel":"kpis","data":{"value":1},"timestamp":1706640000000}"#;
        let env = Envelope::decode(text).expect("decode");
        assert_eq!(env.kind, EnvelopeType::Data);
        assert_eq!(env.channel(), Some("kpis"));
        assert_eq!(env.timestamp, 1_706_640_000_000);
        assert_eq!(env.data, Some(json!({"value": 1})));
    }

    #[test]
    fn test_decode_error_envelope() {
        let text = r#"{"type":"error","error":"unknown channel","timestamp":1}"#;
        let env = Envelope::decode(text).expect("decode");
        assert_eq!(env.kind, EnvelopeType::Error);
        assert_eq!(env.error.as_deref(), Some("unknown channel"));
    }

    #[test]
    fn test_decode_missing_timestamp_defaults() {
        let env = Envelope::decode(r#"{"type":"pong"}"#).expect("decode");
        assert_eq!(env.kind, EnvelopeType::Pong);
        assert_eq!(env.timestamp, 0);
    }

    #[test]
    fn test_decode_fractional_timestamp() {
        let env = Envelope::decode(r#"{"type":"pong","timestamp":1700000000000.0}"#)
            .expect("decode");
        assert_eq!(env.kind, EnvelopeType::Pong);
        assert_eq!(env.timestamp, 1_700_000_000_000);

        let text = r#"{"type":"data","channel":"kpis","data":{"value":1},"timestamp":1706640000000.6}"#;
        let env = Envelope::decode(text).expect("decode");
        assert_eq!(env.timestamp, 1_706_640_000_001);
        assert_eq!(env.data, Some(json!({"value": 1})));
    }

    #[test]
    fn test_decode_rejects_non_numeric_timestamp() {
        assert!(Envelope::decode(r#"{"type":"pong","timestamp":"now"}"#).is_err());
        assert!(Envelope::decode(r#"{"type":"pong","timestamp":1e300}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Envelope::decode("not json").is_err());
        assert!(Envelope::decode(r#"{"type":"teleport"}"#).is_err());
        assert!(Envelope::decode(r#"{"channel":"kpis"}"#).is_err());
    }

    #[test]
    fn test_envelope_type_display() {
        assert_eq!(EnvelopeType::Subscribed.to_string(), "subscribed");
        assert_eq!(EnvelopeType::Data.to_string(), "data");
    }
}
