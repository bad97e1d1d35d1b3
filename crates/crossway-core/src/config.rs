//! Configuration loading and typed config structures for the Crossway
//! dashboard.
//!
//! The canonical configuration lives in `crossway-config.yaml` next to the
//! binary. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file (or no file) is valid.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is outside its permitted range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level dashboard configuration.
///
/// Mirrors the structure of `crossway-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashboardConfig {
    /// Live feed connection and reconnect policy.
    #[serde(default)]
    pub feed: FeedConfig,

    /// History window, trend window and alert expiry.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Observer HTTP surface.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DashboardConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `CROSSWAY_FEED_URL` overrides `feed.url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty map.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.feed.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check that every tunable is within its permitted range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.reconnect_growth < 1.0 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "feed.reconnect_growth must be at least 1.0, got {}",
                    self.feed.reconnect_growth
                ),
            });
        }
        if self.metrics.history_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "metrics.history_capacity must be at least 1".to_owned(),
            });
        }
        if self.metrics.trend_window == 0 {
            return Err(ConfigError::Invalid {
                reason: "metrics.trend_window must be at least 1".to_owned(),
            });
        }
        if self.metrics.alert_ttl_seconds == 0 {
            return Err(ConfigError::Invalid {
                reason: "metrics.alert_ttl_seconds must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Live feed configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedConfig {
    /// WebSocket endpoint of the simulation backend.
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    /// Multiplier applied to the delay for each further attempt.
    #[serde(default = "default_reconnect_growth")]
    pub reconnect_growth: f64,

    /// Automatic reconnect attempts before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl FeedConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CROSSWAY_FEED_URL") {
            self.url = val;
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_growth: default_reconnect_growth(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

/// Metrics engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetricsConfig {
    /// Snapshots kept in the history window.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Snapshots per trend window (`k`).
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    /// Seconds an alert stays active after it was raised.
    #[serde(default = "default_alert_ttl_seconds")]
    pub alert_ttl_seconds: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            trend_window: default_trend_window(),
            alert_ttl_seconds: default_alert_ttl_seconds(),
        }
    }
}

/// Observer HTTP surface configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Address to bind.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_observer_host(),
            port: default_observer_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_feed_url() -> String {
    "ws://localhost:8000/ws".to_owned()
}

const fn default_reconnect_base_delay_ms() -> u64 {
    2000
}

const fn default_reconnect_growth() -> f64 {
    1.5
}

const fn default_max_reconnect_attempts() -> u32 {
    10
}

const fn default_history_capacity() -> usize {
    100
}

const fn default_trend_window() -> usize {
    5
}

const fn default_alert_ttl_seconds() -> u64 {
    300
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}
