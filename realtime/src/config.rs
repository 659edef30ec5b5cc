//! Real-time connection configuration.
//!
//! Provides configuration options for the transport connection: endpoint,
//! heartbeat, and the reconnection policy.

use std::env;
use std::time::Duration;

/// Default dashboard WebSocket URL.
pub const DEFAULT_WS_URL: &str = "ws://localhost:3000/api/websocket/dashboard";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Default base reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 1_000;

/// Maximum reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_CAP_MS: u64 = 30_000;

/// Default maximum number of automatic reconnection attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Default pause between the disconnect and connect halves of `reconnect()`.
pub const DEFAULT_RECONNECT_SETTLE_MS: u64 = 100;

/// Environment variable holding the endpoint URL.
pub const ENV_WS_URL: &str = "PULSEBOARD_WS_URL";

/// Environment variable holding the heartbeat interval in seconds.
pub const ENV_HEARTBEAT_SECS: &str = "PULSEBOARD_HEARTBEAT_SECS";

/// Environment variable holding the base reconnect delay in milliseconds.
pub const ENV_RECONNECT_BASE_MS: &str = "PULSEBOARD_RECONNECT_BASE_MS";

/// Environment variable holding the reconnect delay cap in milliseconds.
pub const ENV_RECONNECT_CAP_MS: &str = "PULSEBOARD_RECONNECT_CAP_MS";

/// Environment variable holding the maximum reconnection attempts.
pub const ENV_RECONNECT_MAX_ATTEMPTS: &str = "PULSEBOARD_RECONNECT_MAX_ATTEMPTS";

/// Configuration for the real-time transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// WebSocket URL.
    pub url: String,

    /// Heartbeat interval.
    pub heartbeat_interval: Duration,

    /// Base reconnect delay (attempt 0).
    pub reconnect_delay: Duration,

    /// Maximum reconnect delay.
    pub max_reconnect_delay: Duration,

    /// Maximum automatic reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,

    /// Pause inside `reconnect()` between closing and reopening.
    pub reconnect_settle_delay: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            max_reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_CAP_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_settle_delay: Duration::from_millis(DEFAULT_RECONNECT_SETTLE_MS),
        }
    }
}

impl RealtimeConfig {
    /// Creates a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Builds a configuration from `PULSEBOARD_*` environment variables,
    /// falling back to defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = env::var(ENV_WS_URL) {
            config.url = url;
        }
        if let Some(secs) = parse_var::<u64>(ENV_HEARTBEAT_SECS)? {
            config.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64>(ENV_RECONNECT_BASE_MS)? {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(ENV_RECONNECT_CAP_MS)? {
            config.max_reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var::<u32>(ENV_RECONNECT_MAX_ATTEMPTS)? {
            config.max_reconnect_attempts = attempts;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the base reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnect delay.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the settle delay used by `reconnect()`.
    #[must_use]
    pub fn with_reconnect_settle_delay(mut self, delay: Duration) -> Self {
        self.reconnect_settle_delay = delay;
        self
    }

    /// Returns the reconnect delay for a zero-based attempt number:
    /// `min(base * 2^attempt, cap)`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.reconnect_delay
            .checked_mul(factor)
            .unwrap_or(self.max_reconnect_delay)
            .min(self.max_reconnect_delay)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::EmptyUrl);
        }

        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(ConfigError::InvalidScheme(self.url.clone()));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::InvalidHeartbeatInterval);
        }

        if self.reconnect_delay > self.max_reconnect_delay {
            return Err(ConfigError::InvalidBackoffRange);
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVariable { name, value: raw }),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The URL is empty.
    #[error("url cannot be empty")]
    EmptyUrl,

    /// The URL does not use a WebSocket scheme.
    #[error("url must start with ws:// or wss://, got {0}")]
    InvalidScheme(String),

    /// Heartbeat interval is zero.
    #[error("heartbeat_interval must be > 0")]
    InvalidHeartbeatInterval,

    /// Base reconnect delay exceeds the cap.
    #[error("reconnect_delay must be <= max_reconnect_delay")]
    InvalidBackoffRange,

    /// An environment variable could not be parsed.
    #[error("invalid value for {name}: {value}")]
    InvalidVariable {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RealtimeConfig::default();
        assert_eq!(config.url, DEFAULT_WS_URL);
        assert_eq!(
            config.heartbeat_interval,
            Duration::from_secs(DEFAULT_HEARTBEAT_SECS)
        );
        assert_eq!(config.max_reconnect_attempts, DEFAULT_MAX_RECONNECT_ATTEMPTS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = RealtimeConfig::new("wss://example.com/ws")
            .with_heartbeat_interval(Duration::from_secs(5))
            .with_reconnect_delay(Duration::from_millis(500))
            .with_max_reconnect_delay(Duration::from_secs(10))
            .with_max_reconnect_attempts(3)
            .with_reconnect_settle_delay(Duration::from_millis(10));

        assert_eq!(config.url, "wss://example.com/ws");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(10));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.reconnect_settle_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_backoff_delay_doubles_until_cap() {
        let config = RealtimeConfig::default();
        assert_eq!(config.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(config.backoff_delay(4), Duration::from_secs(16));
        assert_eq!(config.backoff_delay(5), Duration::from_secs(30));
        assert_eq!(config.backoff_delay(40), Duration::from_secs(30));
    }

    #[test]
    fn test_config_validate_empty_url() {
        let config = RealtimeConfig::new("");
        assert_eq!(config.validate(), Err(ConfigError::EmptyUrl));
    }

    #[test]
    fn test_config_validate_invalid_scheme() {
        let config = RealtimeConfig::new("https://example.com/ws");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_config_validate_zero_heartbeat() {
        let config = RealtimeConfig::default().with_heartbeat_interval(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidHeartbeatInterval)
        );
    }

    #[test]
    fn test_config_validate_inverted_backoff() {
        let config = RealtimeConfig::default()
            .with_reconnect_delay(Duration::from_secs(60))
            .with_max_reconnect_delay(Duration::from_secs(1));
        assert_eq!(config.validate(), Err(ConfigError::InvalidBackoffRange));
    }
}
