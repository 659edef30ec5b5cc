//! Domain health monitor.

use std::collections::BTreeMap;
use std::fmt;

use pulseboard_realtime::{channels, DataPointType, RealTimeDataPoint, RealtimeContext};
use serde::{Deserialize, Serialize};

use crate::error::HookError;
use crate::hook::{self, Applied, Attachment, HookState};

/// Health status of a domain, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Operating normally.
    Healthy,
    /// Degraded.
    Warning,
    /// Failing.
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl HealthStatus {
    fn parse(raw: &str) -> Result<Self, HookError> {
        match raw {
            "healthy" => Ok(Self::Healthy),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(HookError::InvalidField {
                field: "status".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Latest health report for one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainHealth {
    /// Domain name.
    pub domain: String,
    /// Status.
    pub status: HealthStatus,
    /// Response time in milliseconds.
    pub response_time: f64,
    /// Error rate.
    pub error_rate: f64,
    /// Requests per second.
    pub throughput: f64,
    /// Open issues.
    pub issues: Vec<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Domain health monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthMonitorConfig {
    /// Channel to subscribe to.
    pub channel: String,
    /// Monitored domains; empty monitors all.
    pub domains: Vec<String>,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            channel: channels::HEALTH.to_string(),
            domains: Vec::new(),
        }
    }
}

impl HealthMonitorConfig {
    /// Sets the channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Monitors one more domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domains.push(domain.into());
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), HookError> {
        if self.channel.is_empty() {
            return Err(HookError::InvalidConfig("channel cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Read-only view of the monitored domains.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Latest report per domain, sorted by domain.
    pub domains: Vec<DomainHealth>,
    /// Worst status across domains.
    pub overall_status: Option<HealthStatus>,
    /// Last validation failure.
    pub error: Option<String>,
}

/// State machine behind [`DomainHealthMonitor`].
#[derive(Debug)]
pub struct HealthState {
    config: HealthMonitorConfig,
    domains: BTreeMap<String, DomainHealth>,
    error: Option<HookError>,
}

impl HealthState {
    /// Creates an empty state.
    #[must_use]
    pub fn new(config: HealthMonitorConfig) -> Self {
        Self {
            config,
            domains: BTreeMap::new(),
            error: None,
        }
    }

    /// Returns the latest report for a domain.
    #[must_use]
    pub fn get(&self, domain: &str) -> Option<&DomainHealth> {
        self.domains.get(domain)
    }

    /// Returns the worst status across domains, if any reported.
    #[must_use]
    pub fn overall_status(&self) -> Option<HealthStatus> {
        self.domains.values().map(|d| d.status).max()
    }

    /// Returns a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            domains: self.domains.values().cloned().collect(),
            overall_status: self.overall_status(),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

impl HookState for HealthState {
    fn apply(&mut self, point: &RealTimeDataPoint) -> Result<Applied, HookError> {
        if point.kind != DataPointType::Health {
            return Ok(Applied::Ignored);
        }
        if !self.config.domains.is_empty() && !self.config.domains.contains(&point.domain) {
            return Ok(Applied::Ignored);
        }

        let status = HealthStatus::parse(&hook::text(point, "status")?)?;
        let issues = match point.field("issues") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect(),
            Some(other) => {
                return Err(HookError::InvalidField {
                    field: "issues".to_string(),
                    value: other.to_string(),
                })
            }
        };

        let report = DomainHealth {
            domain: point.domain.clone(),
            status,
            response_time: hook::number(point, "responseTime")?,
            error_rate: hook::number(point, "errorRate")?,
            throughput: hook::number(point, "throughput")?,
            issues,
            timestamp: point.timestamp,
        };
        self.domains.insert(report.domain.clone(), report);
        Ok(Applied::Accepted)
    }

    fn error_slot(&mut self) -> &mut Option<HookError> {
        &mut self.error
    }
}

/// Health hook attached to a context.
#[derive(Debug)]
pub struct DomainHealthMonitor {
    attachment: Attachment<HealthState>,
}

impl DomainHealthMonitor {
    /// Subscribes a new monitor to `config.channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn attach(context: &RealtimeContext, config: HealthMonitorConfig) -> Result<Self, HookError> {
        config.validate()?;
        let channel = config.channel.clone();
        Ok(Self {
            attachment: Attachment::new(context, &channel, HealthState::new(config)),
        })
    }

    /// Returns the channel.
    #[must_use]
    pub fn channel(&self) -> &str {
        self.attachment.channel()
    }

    /// Returns true while subscribed.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attachment.is_attached()
    }

    /// Returns a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        self.attachment.state().snapshot()
    }

    /// Returns the latest report for a domain.
    #[must_use]
    pub fn get(&self, domain: &str) -> Option<DomainHealth> {
        self.attachment.state().get(domain).cloned()
    }

    /// Returns the worst status across domains.
    #[must_use]
    pub fn overall_status(&self) -> Option<HealthStatus> {
        self.attachment.state().overall_status()
    }
}
