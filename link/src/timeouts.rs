//! Timeout configuration for sublink connections.

use std::time::Duration;

/// Timeout configuration for a node connection.
///
/// There is deliberately no per-call timeout: a `call` suspends until its
/// response arrives or the connection is lost. Callers that need one can
/// wrap `call` in `tokio::time::timeout`.
///
/// # Examples
///
/// ```rust
/// use sublink::SublinkTimeouts;
/// use std::time::Duration;
///
/// let timeouts = SublinkTimeouts::default();
///
/// let timeouts = SublinkTimeouts::builder()
///     .connect_timeout(Duration::from_secs(30))
///     .keepalive_interval_secs(60)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct SublinkTimeouts {
    /// Timeout for the WebSocket handshake on connect and reconnect.
    /// Default: 10 seconds.
    pub connect_timeout: Duration,

    /// Keep-alive Ping interval while the connection is idle.
    /// Set to 0 to disable keep-alive pings.
    /// Default: 30 seconds.
    pub keepalive_interval: Duration,

    /// Maximum wait for any frame after sending a keep-alive Ping before
    /// the connection is treated as dead and torn down for reconnection.
    /// Set to 0 to disable.
    /// Default: 5 seconds.
    pub pong_timeout: Duration,
}

impl Default for SublinkTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(5),
        }
    }
}

impl SublinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> SublinkTimeoutsBuilder {
        SublinkTimeoutsBuilder::new()
    }

    /// Timeouts suited to a local development node.
    pub fn fast() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            keepalive_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(2),
        }
    }

    /// Check if a duration represents "no timeout".
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero()
    }
}

/// Builder for [`SublinkTimeouts`].
#[derive(Debug, Clone)]
pub struct SublinkTimeoutsBuilder {
    timeouts: SublinkTimeouts,
}

impl SublinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: SublinkTimeouts::default(),
        }
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect_timeout = timeout;
        self
    }

    /// Set the connect timeout in seconds.
    pub fn connect_timeout_secs(self, secs: u64) -> Self {
        self.connect_timeout(Duration::from_secs(secs))
    }

    /// Set the keep-alive ping interval. Zero disables pings.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.timeouts.keepalive_interval = interval;
        self
    }

    /// Set the keep-alive ping interval in seconds. Zero disables pings.
    pub fn keepalive_interval_secs(self, secs: u64) -> Self {
        self.keepalive_interval(Duration::from_secs(secs))
    }

    /// Set the pong timeout. Zero disables liveness checking.
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.pong_timeout = timeout;
        self
    }

    /// Set the pong timeout in seconds. Zero disables liveness checking.
    pub fn pong_timeout_secs(self, secs: u64) -> Self {
        self.pong_timeout(Duration::from_secs(secs))
    }

    /// Build the timeout configuration.
    pub fn build(self) -> SublinkTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = SublinkTimeouts::default();
        assert_eq!(timeouts.connect_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.keepalive_interval, Duration::from_secs(30));
        assert_eq!(timeouts.pong_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder() {
        let timeouts = SublinkTimeouts::builder()
            .connect_timeout_secs(60)
            .keepalive_interval(Duration::ZERO)
            .pong_timeout_secs(1)
            .build();

        assert_eq!(timeouts.connect_timeout, Duration::from_secs(60));
        assert!(timeouts.keepalive_interval.is_zero());
        assert_eq!(timeouts.pong_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_is_no_timeout() {
        assert!(SublinkTimeouts::is_no_timeout(Duration::ZERO));
        assert!(!SublinkTimeouts::is_no_timeout(Duration::from_secs(1)));
    }
}
