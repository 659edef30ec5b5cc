//! KPI board.
//!
//! Latest-wins table of key performance indicators keyed by id. Values are
//! exposed in first-seen order; each overwrite keeps the previous value and
//! the trend from it.

use std::collections::HashMap;

use pulseboard_realtime::{channels, DataPointType, RealTimeDataPoint, RealtimeContext};
use serde::{Deserialize, Serialize};

use crate::error::HookError;
use crate::history::Trend;
use crate::hook::{self, Applied, Attachment, HookState};

/// One key performance indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    /// KPI id.
    pub id: String,
    /// Display name.
    pub name: Option<String>,
    /// Current value.
    pub value: f64,
    /// Unit of measure.
    pub unit: Option<String>,
    /// Target value.
    pub target: Option<f64>,
    /// Originating domain.
    pub domain: String,
    /// Milliseconds since the Unix epoch of the current value.
    pub timestamp: i64,
    /// Value before the latest update.
    pub previous_value: Option<f64>,
    /// Trend from the previous value.
    pub trend: Option<Trend>,
}

/// KPI board configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KpiBoardConfig {
    /// Channel to subscribe to.
    pub channel: String,
    /// Accepted KPI ids; empty accepts all.
    pub kpi_ids: Vec<String>,
}

impl Default for KpiBoardConfig {
    fn default() -> Self {
        Self {
            channel: channels::KPIS.to_string(),
            kpi_ids: Vec::new(),
        }
    }
}

impl KpiBoardConfig {
    /// Sets the channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Accepts one more KPI id.
    #[must_use]
    pub fn with_kpi(mut self, id: impl Into<String>) -> Self {
        self.kpi_ids.push(id.into());
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

    fn accepts(&self, id: &str) -> bool {
        self.kpi_ids.is_empty() || self.kpi_ids.iter().any(|k| k == id)
    }
}

/// Read-only view of a KPI board.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    /// KPIs in first-seen order.
    pub kpis: Vec<Kpi>,
    /// Last validation failure.
    pub error: Option<String>,
}

/// State machine behind [`KpiBoard`].
#[derive(Debug)]
pub struct KpiState {
    config: KpiBoardConfig,
    kpis: Vec<Kpi>,
    index: HashMap<String, usize>,
    error: Option<HookError>,
}

impl KpiState {
    /// Creates an empty state.
    #[must_use]
    pub fn new(config: KpiBoardConfig) -> Self {
        Self {
            config,
            kpis: Vec::new(),
            index: HashMap::new(),
            error: None,
        }
    }

    /// Returns a KPI by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Kpi> {
        self.index.get(id).and_then(|&i| self.kpis.get(i))
    }

    /// Returns the number of KPIs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kpis.len()
    }

    /// Returns true if no KPI has been seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kpis.is_empty()
    }

    /// Inserts or overwrites a KPI.
    pub fn upsert(&mut self, mut kpi: Kpi) {
        match self.index.get(&kpi.id).and_then(|&i| self.kpis.get_mut(i)) {
            Some(existing) => {
                kpi.previous_value = Some(existing.value);
                kpi.trend = Some(Trend::between(existing.value, kpi.value));
                *existing = kpi;
            }
            None => {
                self.index.insert(kpi.id.clone(), self.kpis.len());
                self.kpis.push(kpi);
            }
        }
    }

    /// Returns a snapshot.
    #[must_use]
    pub fn snapshot(&self) -> KpiSnapshot {
        KpiSnapshot {
            kpis: self.kpis.clone(),
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

impl HookState for KpiState {
    fn apply(&mut self, point: &RealTimeDataPoint) -> Result<Applied, HookError> {
        if point.kind != DataPointType::Kpi {
            return Ok(Applied::Ignored);
        }

        let id = hook::text(point, "id")?;
        if !self.config.accepts(&id) {
            return Ok(Applied::Ignored);
        }

        let kpi = Kpi {
            value: hook::number(point, "value")?,
            name: hook::optional_text(point, "name")?,
            unit: hook::optional_text(point, "unit")?,
            target: hook::optional_number(point, "target")?,
            domain: point.domain.clone(),
            timestamp: point.timestamp,
            previous_value: None,
            trend: None,
            id,
        };
        self.upsert(kpi);
        Ok(Applied::Accepted)
    }

    fn error_slot(&mut self) -> &mut Option<HookError> {
        &mut self.error
    }
}

/// KPI hook attached to a context.
#[derive(Debug)]
pub struct KpiBoard {
    attachment: Attachment<KpiState>,
}

impl KpiBoard {
    /// Subscribes a new KPI board to `config.channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn attach(context: &RealtimeContext, config: KpiBoardConfig) -> Result<Self, HookError> {
        config.validate()?;
        let channel = config.channel.clone();
        Ok(Self {
            attachment: Attachment::new(context, &channel, KpiState::new(config)),
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
    pub fn snapshot(&self) -> KpiSnapshot {
        self.attachment.state().snapshot()
    }

    /// Returns a KPI by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Kpi> {
        self.attachment.state().get(id).cloned()
    }
}
