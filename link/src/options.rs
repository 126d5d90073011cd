//! Connection-level options for the WebSocket client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Options controlling reconnection behavior after an unexpected drop.
///
/// Reconnection only applies once a connection has been established;
/// failures of the initial connect are returned to the caller directly.
///
/// # Example
///
/// ```rust
/// use sublink::ConnectionOptions;
///
/// let options = ConnectionOptions::new()
///     .with_reconnect_delay_ms(500)
///     .with_max_reconnect_attempts(Some(10));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Enable automatic reconnection on connection loss.
    /// Default: true.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Initial delay in milliseconds between reconnection attempts.
    /// Doubles per attempt up to `max_reconnect_delay_ms`.
    /// Default: 1000ms.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Maximum delay between reconnection attempts.
    /// Default: 30000ms.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Maximum number of reconnection attempts before giving up.
    /// Default: None (retry forever).
    /// Set to Some(0) to disable reconnection entirely.
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30000
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 30000,
            max_reconnect_attempts: None,
        }
    }
}

impl ConnectionOptions {
    /// Create new connection options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to automatically reconnect on connection loss.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the initial delay between reconnection attempts (in milliseconds).
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the maximum delay between reconnection attempts (in milliseconds).
    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// Set the maximum number of reconnection attempts.
    /// Pass None for infinite retries, Some(0) to disable reconnection.
    pub fn with_max_reconnect_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    /// Backoff delay before reconnection attempt `attempt` (0-indexed).
    pub(crate) fn backoff_delay(&self, attempt: u32) -> Duration {
        let ms = self
            .reconnect_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_reconnect_delay_ms);
        Duration::from_millis(ms)
    }

    /// Whether attempt `attempt` (0-indexed) exceeds the configured budget.
    pub(crate) fn attempts_exhausted(&self, attempt: u32) -> bool {
        match self.max_reconnect_attempts {
            Some(max) => attempt >= max,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectionOptions::default();
        assert!(options.auto_reconnect);
        assert_eq!(options.reconnect_delay_ms, 1000);
        assert_eq!(options.max_reconnect_delay_ms, 30000);
        assert_eq!(options.max_reconnect_attempts, None);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let options = ConnectionOptions::new()
            .with_reconnect_delay_ms(100)
            .with_max_reconnect_delay_ms(1000);

        assert_eq!(options.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(options.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(options.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(options.backoff_delay(3), Duration::from_millis(800));
        // Capped from here on, including absurd attempt counts.
        assert_eq!(options.backoff_delay(4), Duration::from_millis(1000));
        assert_eq!(options.backoff_delay(63), Duration::from_millis(1000));
    }

    #[test]
    fn test_attempt_budget() {
        let unlimited = ConnectionOptions::default();
        assert!(!unlimited.attempts_exhausted(u32::MAX));

        let limited = ConnectionOptions::new().with_max_reconnect_attempts(Some(3));
        assert!(!limited.attempts_exhausted(2));
        assert!(limited.attempts_exhausted(3));

        // Some(0) means reconnection is disabled outright.
        let disabled = ConnectionOptions::new().with_max_reconnect_attempts(Some(0));
        assert!(disabled.attempts_exhausted(0));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let options: ConnectionOptions = serde_json::from_str("{}").unwrap();
        assert!(options.auto_reconnect);
        assert_eq!(options.reconnect_delay_ms, 1000);

        let options: ConnectionOptions =
            serde_json::from_str(r#"{"auto_reconnect":false,"max_reconnect_attempts":5}"#)
                .unwrap();
        assert!(!options.auto_reconnect);
        assert_eq!(options.max_reconnect_attempts, Some(5));
    }
}
