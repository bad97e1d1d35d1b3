//! Exponential reconnect back-off.

use std::time::Duration;

use crossway_core::config::FeedConfig;

/// How long to wait before each automatic reconnect, and how many to try.
///
/// The delay before attempt `n` (1-based) is `base * growth^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt.
    pub base_delay: Duration,
    /// Factor applied per further attempt. At least `1.0`.
    pub growth: f64,
    /// Attempts allowed before the feed reports failure.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay to wait before attempt `attempt` (1-based).
    ///
    /// Attempt `0` is treated as attempt `1`. Delays too large to
    /// represent saturate at [`Duration::MAX`].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.growth.max(1.0).powi(exponent);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for ReconnectPolicy {
    fn from(config: &FeedConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            growth: config.reconnect_growth,
            max_attempts: config.max_reconnect_attempts,
        }
    }
}
