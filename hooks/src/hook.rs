//! Plumbing shared by every hook: the state trait, payload field readers,
//! and the attachment that binds a state to a channel subscription.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pulseboard_realtime::{RealTimeDataPoint, RealtimeContext, Subscription};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::HookError;

/// Result of applying one data point to a hook state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The point changed the state.
    Accepted,
    /// The point did not qualify and was ignored.
    Ignored,
}

/// Pure state machine behind a hook.
pub trait HookState: Send + 'static {
    /// Applies one data point.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload fails validation; the state is left
    /// unchanged in that case.
    fn apply(&mut self, point: &RealTimeDataPoint) -> Result<Applied, HookError>;

    /// Hook-local error slot.
    fn error_slot(&mut self) -> &mut Option<HookError>;

    /// Applies a point and updates the error slot: a rejected point sets it,
    /// an accepted one clears it, an ignored one leaves it alone.
    fn ingest(&mut self, point: &RealTimeDataPoint) -> Applied {
        match self.apply(point) {
            Ok(Applied::Accepted) => {
                *self.error_slot() = None;
                Applied::Accepted
            }
            Ok(Applied::Ignored) => Applied::Ignored,
            Err(e) => {
                warn!("Rejected data point from {}: {}", point.domain, e);
                *self.error_slot() = Some(e);
                Applied::Ignored
            }
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A hook state bound to a channel. Dropping it unsubscribes.
#[derive(Debug)]
pub(crate) struct Attachment<S> {
    state: Arc<Mutex<S>>,
    subscription: Subscription,
}

impl<S: HookState> Attachment<S> {
    pub(crate) fn new(context: &RealtimeContext, channel: &str, state: S) -> Self {
        let state = Arc::new(Mutex::new(state));
        let sink = Arc::downgrade(&state);

        let subscription = context.subscribe(channel, move |point| {
            if let Some(state) = sink.upgrade() {
                lock(&state).ingest(point);
            }
        });
        debug!("Hook attached to channel: {}", channel);

        Self {
            state,
            subscription,
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, S> {
        lock(&self.state)
    }

    pub(crate) fn shared(&self) -> &Arc<Mutex<S>> {
        &self.state
    }

    pub(crate) fn channel(&self) -> &str {
        self.subscription.channel()
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.subscription.is_active()
    }
}

fn describe(value: &Value) -> String {
    value.to_string()
}

/// Reads a required finite number. Strings are rejected, not coerced.
pub(crate) fn number(point: &RealTimeDataPoint, field: &str) -> Result<f64, HookError> {
    let value = point
        .field(field)
        .ok_or_else(|| HookError::MissingField(field.to_string()))?;
    match value.as_f64() {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(HookError::NotNumeric {
            field: field.to_string(),
            value: describe(value),
        }),
    }
}

/// Reads an optional number; present but non-numeric values are rejected.
pub(crate) fn optional_number(
    point: &RealTimeDataPoint,
    field: &str,
) -> Result<Option<f64>, HookError> {
    match point.field(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => number(point, field).map(Some),
    }
}

/// Reads a required string.
pub(crate) fn text(point: &RealTimeDataPoint, field: &str) -> Result<String, HookError> {
    match point.field(field) {
        None | Some(Value::Null) => Err(HookError::MissingField(field.to_string())),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(HookError::InvalidField {
            field: field.to_string(),
            value: describe(other),
        }),
    }
}

/// Reads an optional string.
pub(crate) fn optional_text(
    point: &RealTimeDataPoint,
    field: &str,
) -> Result<Option<String>, HookError> {
    match point.field(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => text(point, field).map(Some),
    }
}

/// Builds an id for records that arrive without one.
pub(crate) fn derived_id(prefix: &str, timestamp: i64, sequence: u64) -> String {
    format!("{}-{}-{}", prefix, timestamp, sequence)
}
