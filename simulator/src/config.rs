//! Simulator configuration.

use std::env;
use std::time::Duration;

use crate::error::SimulatorError;

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port; matches the client's default endpoint.
pub const DEFAULT_PORT: u16 = 3000;

/// Default interval between generated data frames, in milliseconds.
pub const DEFAULT_TICK_MS: u64 = 1_000;

/// WebSocket route served by the simulator.
pub const DASHBOARD_PATH: &str = "/api/websocket/dashboard";

/// Configuration for the development simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Interval between generated data frames per session.
    pub tick_interval: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }
}

impl SimulatorConfig {
    /// Creates a configuration bound to `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Reads `SIMULATOR_HOST`, `SIMULATOR_PORT` and `SIMULATOR_TICK_MS`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the result is
    /// invalid.
    pub fn from_env() -> Result<Self, SimulatorError> {
        let mut config = Self::default();

        if let Ok(host) = env::var("SIMULATOR_HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("SIMULATOR_PORT") {
            config.port = port
                .parse()
                .map_err(|_| SimulatorError::InvalidConfig(format!("SIMULATOR_PORT: {}", port)))?;
        }
        if let Ok(tick) = env::var("SIMULATOR_TICK_MS") {
            let ms: u64 = tick
                .parse()
                .map_err(|_| SimulatorError::InvalidConfig(format!("SIMULATOR_TICK_MS: {}", tick)))?;
            config.tick_interval = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the tick interval.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Returns the bind address.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if self.host.is_empty() {
            return Err(SimulatorError::InvalidConfig("host cannot be empty".to_string()));
        }
        if self.tick_interval.is_zero() {
            return Err(SimulatorError::InvalidConfig(
                "tick_interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_config_default() {
        let config = SimulatorConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:3000");
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_ok!(config.validate());
    }

    #[test]
    fn test_config_validate() {
        assert_err!(SimulatorConfig::new("", 3000).validate());
        assert_err!(SimulatorConfig::default()
            .with_tick_interval(Duration::ZERO)
            .validate());
    }
}
