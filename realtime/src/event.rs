//! Domain events delivered to consumers.
//!
//! A [`RealTimeDataPoint`] is the decoded payload of a `data` envelope.
//! Consumers only ever see these, never the envelope that carried them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RealtimeError;

/// Kind of domain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataPointType {
    /// Key performance indicator update.
    Kpi,
    /// Business event.
    Event,
    /// Operational alert.
    Alert,
    /// Domain health report.
    Health,
    /// Generic metric sample.
    Data,
}

/// Event priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority.
    Medium,
    /// High priority.
    High,
}

/// Optional event metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPointMetadata {
    /// Producing system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Priority hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    /// Ids of related events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<Vec<String>>,
}

/// A decoded domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealTimeDataPoint {
    /// Milliseconds since the Unix epoch.
    #[serde(deserialize_with = "crate::envelope::deserialize_millis")]
    pub timestamp: i64,

    /// Event kind.
    #[serde(rename = "type")]
    pub kind: DataPointType,

    /// Business domain (sales, inventory, shipping, users, ...).
    pub domain: String,

    /// Event payload; always a JSON object.
    pub data: Map<String, Value>,

    /// Optional metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DataPointMetadata>,
}

impl RealTimeDataPoint {
    /// Creates a new data point.
    #[must_use]
    pub fn new(
        timestamp: i64,
        kind: DataPointType,
        domain: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp,
            kind,
            domain: domain.into(),
            data,
            metadata: None,
        }
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: DataPointMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Decodes a data point from an envelope payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not match the data point schema.
    pub fn from_value(value: Value) -> Result<Self, RealtimeError> {
        serde_json::from_value(value).map_err(|e| RealtimeError::Deserialization(e.to_string()))
    }

    /// Encodes the data point as an envelope payload.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_value(&self) -> Result<Value, RealtimeError> {
        serde_json::to_value(self).map_err(|e| RealtimeError::Serialization(e.to_string()))
    }

    /// Returns a payload field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Returns a payload field as a string slice.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    /// Returns the metadata priority, if any.
    #[must_use]
    pub fn priority(&self) -> Option<Priority> {
        self.metadata.as_ref().and_then(|m| m.priority)
    }
}
