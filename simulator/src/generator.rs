//! Synthetic payload generator.
//!
//! Produces one data point per standard channel per tick. Values follow a
//! sine wave over the tick counter, so a given tick always yields the same
//! payload apart from its timestamp.

use std::f64::consts::TAU;

use pulseboard_realtime::{
    channels, now_millis, DataPointMetadata, DataPointType, Priority, RealTimeDataPoint,
};
use serde_json::{json, Map, Value};

const DOMAINS: [&str; 4] = ["sales", "inventory", "shipping", "users"];

const KPIS: [(&str, &str, &str, f64, f64); 4] = [
    ("sales_revenue", "Sales revenue", "USD", 12_500.0, 15_000.0),
    ("inventory_turnover", "Inventory turnover", "x", 6.0, 8.0),
    ("on_time_delivery", "On-time delivery", "%", 94.0, 98.0),
    ("active_users", "Active users", "users", 1_800.0, 2_000.0),
];

const EVENT_TYPES: [&str; 4] = [
    "order_placed",
    "stock_replenished",
    "shipment_dispatched",
    "user_signup",
];

const SEVERITIES: [&str; 4] = ["info", "warning", "error", "critical"];

/// Alerts are emitted on every n-th tick.
pub const ALERT_EVERY: u64 = 5;

/// Deterministic source of dashboard data points.
#[derive(Debug, Clone, Default)]
pub struct PayloadGenerator {
    tick: u64,
}

fn pick<T: Copy>(items: &[T], tick: u64) -> Option<T> {
    let len = u64::try_from(items.len()).ok()?;
    if len == 0 {
        return None;
    }
    let index = usize::try_from(tick % len).ok()?;
    items.get(index).copied()
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn metadata(priority: Priority) -> DataPointMetadata {
    DataPointMetadata {
        source: Some("simulator".to_string()),
        priority: Some(priority),
        ..Default::default()
    }
}

impl PayloadGenerator {
    /// Creates a generator at tick 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Moves to the next tick.
    pub fn advance(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    /// `base + amplitude * sin(2π * tick / period)`.
    #[must_use]
    pub fn wave(&self, base: f64, amplitude: f64, period: u64) -> f64 {
        let phase = (self.tick % period.max(1)) as f64 / period.max(1) as f64;
        base + amplitude * (TAU * phase).sin()
    }

    /// Returns the data point for `channel` at the current tick, or `None`
    /// if the channel is unknown or has nothing to emit on this tick.
    #[must_use]
    pub fn point(&self, channel: &str) -> Option<RealTimeDataPoint> {
        match channel {
            channels::METRICS => Some(self.metric()),
            channels::KPIS => self.kpi(),
            channels::EVENTS => self.event(),
            channels::ALERTS => self.alert(),
            channels::HEALTH => self.health(),
            _ => None,
        }
    }

    fn metric(&self) -> RealTimeDataPoint {
        let value = (self.wave(55.0, 25.0, 60) * 100.0).round() / 100.0;
        RealTimeDataPoint::new(
            now_millis(),
            DataPointType::Data,
            "system",
            object(json!({ "metric": "cpu_usage", "value": value })),
        )
        .with_metadata(metadata(Priority::Low))
    }

    fn kpi(&self) -> Option<RealTimeDataPoint> {
        let (id, name, unit, base, target) = pick(&KPIS, self.tick)?;
        let domain = pick(&DOMAINS, self.tick)?;
        let value = (self.wave(base, base * 0.1, 40) * 100.0).round() / 100.0;

        Some(
            RealTimeDataPoint::new(
                now_millis(),
                DataPointType::Kpi,
                domain,
                object(json!({
                    "id": id,
                    "name": name,
                    "value": value,
                    "unit": unit,
                    "target": target,
                })),
            )
            .with_metadata(metadata(Priority::Medium)),
        )
    }

    fn event(&self) -> Option<RealTimeDataPoint> {
        let event_type = pick(&EVENT_TYPES, self.tick)?;
        let domain = pick(&DOMAINS, self.tick)?;

        Some(
            RealTimeDataPoint::new(
                now_millis(),
                DataPointType::Event,
                domain,
                object(json!({
                    "id": format!("sim-event-{}", self.tick),
                    "eventType": event_type,
                    "description": format!("{} in {}", event_type.replace('_', " "), domain),
                })),
            )
            .with_metadata(metadata(Priority::Low)),
        )
    }

    fn alert(&self) -> Option<RealTimeDataPoint> {
        if self.tick % ALERT_EVERY != 0 {
            return None;
        }
        let round = self.tick / ALERT_EVERY;
        let severity = pick(&SEVERITIES, round)?;
        let domain = pick(&DOMAINS, round)?;
        let priority = match severity {
            "critical" | "error" => Priority::High,
            "warning" => Priority::Medium,
            _ => Priority::Low,
        };

        Some(
            RealTimeDataPoint::new(
                now_millis(),
                DataPointType::Alert,
                domain,
                object(json!({
                    "id": format!("sim-alert-{}", self.tick),
                    "severity": severity,
                    "title": format!("Simulated {} alert", severity),
                    "message": format!("Threshold crossed in {}", domain),
                })),
            )
            .with_metadata(metadata(priority)),
        )
    }

    fn health(&self) -> Option<RealTimeDataPoint> {
        let domain = pick(&DOMAINS, self.tick)?;
        let error_rate = (self.wave(0.03, 0.03, 30).max(0.0) * 10_000.0).round() / 10_000.0;
        let status = if error_rate < 0.02 {
            "healthy"
        } else if error_rate < 0.05 {
            "warning"
        } else {
            "error"
        };
        let mut data = json!({
            "status": status,
            "responseTime": self.wave(180.0, 60.0, 45).round(),
            "errorRate": error_rate,
            "throughput": self.wave(400.0, 120.0, 50).round(),
        });
        if status != "healthy" {
            data["issues"] = json!([format!("elevated error rate in {}", domain)]);
        }

        Some(
            RealTimeDataPoint::new(now_millis(), DataPointType::Health, domain, object(data))
                .with_metadata(metadata(Priority::Medium)),
        )
    }
}
