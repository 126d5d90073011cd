//! Error types for the sublink client.

use thiserror::Error;

/// Result type for sublink operations.
pub type Result<T> = std::result::Result<T, SublinkError>;

/// Errors that can occur while talking to a node.
#[derive(Debug, Error)]
pub enum SublinkError {
    /// The WebSocket handshake did not complete within the connect timeout.
    #[error("connect timed out")]
    ConnectTimeout,

    /// Low-level I/O failure establishing or maintaining the stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection dropped before a response arrived, or reconnection
    /// gave up after exhausting its attempt budget.
    #[error("connection lost")]
    ConnectionLost,

    /// The node understood the request and reported an application-level
    /// error. Never retried automatically: the request may have had side
    /// effects on the node.
    #[error("node error {code}: {message}")]
    Remote { code: i64, message: String },

    /// Operation attempted after the client was explicitly closed.
    #[error("client closed")]
    ClientClosed,

    /// Failed to encode a request or decode a response envelope.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SublinkError {
    /// Create a Transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        SublinkError::Transport(msg.into())
    }

    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        SublinkError::Configuration(msg.into())
    }

    /// Returns true if retrying the operation might succeed.
    ///
    /// `Remote` errors are never retryable here: the node already accepted
    /// the request once, and resubmitting a side-effecting call (such as an
    /// extrinsic submission) must stay a caller decision.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SublinkError::ConnectTimeout
                | SublinkError::Transport(_)
                | SublinkError::ConnectionLost
        )
    }
}

impl From<serde_json::Error> for SublinkError {
    fn from(err: serde_json::Error) -> Self {
        SublinkError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SublinkError::Remote {
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert_eq!(err.to_string(), "node error -32601: Method not found");

        let err = SublinkError::ClientClosed;
        assert_eq!(err.to_string(), "client closed");
    }

    #[test]
    fn test_retryable() {
        assert!(SublinkError::ConnectTimeout.is_retryable());
        assert!(SublinkError::transport("broken pipe").is_retryable());
        assert!(SublinkError::ConnectionLost.is_retryable());

        assert!(!SublinkError::ClientClosed.is_retryable());
        assert!(!SublinkError::Remote {
            code: 1010,
            message: "Invalid Transaction".to_string()
        }
        .is_retryable());
        assert!(!SublinkError::configuration("endpoint is required").is_retryable());
    }
}
