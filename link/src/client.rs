//! Node client with builder pattern.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::connection::{
    run_connection, ConnCmd, ConnectionConfig, ConnectionState, SharedState, SubscribeRequest,
    DEFAULT_EVENT_CHANNEL_CAPACITY,
};
use crate::error::{Result, SublinkError};
use crate::event_handlers::EventHandlers;
use crate::options::ConnectionOptions;
use crate::subscription::Subscription;
use crate::timeouts::SublinkTimeouts;

/// Default node endpoint used by the examples and the CLI.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:9944";

const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Handle to one logical node connection.
///
/// Cheap to clone; all clones share the same connection. Requests and
/// subscriptions from any number of tasks are multiplexed over it, and
/// each suspends only its own task while waiting.
///
/// # Examples
///
/// ```rust,no_run
/// use sublink::SublinkClient;
/// use std::time::Duration;
///
/// # async fn example() -> sublink::Result<()> {
/// let client = SublinkClient::builder()
///     .endpoint("ws://localhost:9944")
///     .timeouts(sublink::SublinkTimeouts::builder()
///         .connect_timeout(Duration::from_secs(30))
///         .build())
///     .connect()
///     .await?;
///
/// let metadata = client.get_metadata().await?;
/// println!("metadata: {} bytes of hex", metadata.len());
///
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct SublinkClient {
    endpoint: String,
    cmd_tx: mpsc::Sender<ConnCmd>,
    shared: SharedState,
}

impl SublinkClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> SublinkClientBuilder {
        SublinkClientBuilder::new()
    }

    /// Connect to `endpoint` with default configuration.
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self> {
        Self::builder().endpoint(endpoint).connect().await
    }

    /// The endpoint this client was connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current lifecycle state of the connection.
    pub fn state(&self) -> ConnectionState {
        self.shared.get()
    }

    /// Whether the connection is currently up.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Suspend until the connection reaches `target`. Useful for observing
    /// reconnection and shutdown from the outside.
    pub async fn wait_for_state(&self, target: ConnectionState) {
        self.shared.wait_for(target).await;
    }

    /// Issue a request and suspend until the matching response arrives.
    ///
    /// Responses are matched strictly by request id, so concurrent calls
    /// from any number of tasks each get their own result regardless of
    /// the order the node answers in. There is no automatic retry: if the
    /// connection drops before the response arrives this fails with
    /// [`SublinkError::ConnectionLost`], and resubmitting is the caller's
    /// decision.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let (result_tx, result_rx) = oneshot::channel();
        self.cmd_tx
            .send(ConnCmd::Call {
                method: method.to_string(),
                params,
                result_tx,
            })
            .await
            .map_err(|_| self.shared.closed_error())?;
        result_rx.await.map_err(|_| self.shared.closed_error())?
    }

    /// Register a subscription and suspend until the node acknowledges it.
    ///
    /// `unsubscribe_method` is the paired cancel method, sent by
    /// [`Subscription::unsubscribe`] and on drop. After a transport drop
    /// the registration is replayed automatically on the next successful
    /// reconnect.
    pub async fn subscribe(
        &self,
        method: &str,
        params: Vec<Value>,
        unsubscribe_method: &str,
    ) -> Result<Subscription> {
        let (event_tx, event_rx) = mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        let (result_tx, result_rx) = oneshot::channel();
        self.cmd_tx
            .send(ConnCmd::Subscribe {
                request: SubscribeRequest {
                    method: method.to_string(),
                    params,
                    unsubscribe_method: unsubscribe_method.to_string(),
                    event_tx,
                },
                result_tx,
            })
            .await
            .map_err(|_| self.shared.closed_error())?;
        let ack = result_rx.await.map_err(|_| self.shared.closed_error())??;
        Ok(Subscription::new(
            ack.local_id,
            ack.server_id,
            method.to_string(),
            event_rx,
            self.cmd_tx.clone(),
        ))
    }

    /// Close the connection.
    ///
    /// Idempotent. Every pending call resolves with
    /// [`SublinkError::ClientClosed`], every subscription stream receives a
    /// final `ClientClosed` error and ends, and the background task is torn
    /// down before this returns.
    pub async fn close(&self) {
        self.shared.mark_user_closed();
        if self.cmd_tx.send(ConnCmd::Shutdown).await.is_ok() {
            self.shared.wait_for(ConnectionState::Closed).await;
        }
    }
}

/// Builder for [`SublinkClient`] instances.
pub struct SublinkClientBuilder {
    endpoint: Option<String>,
    timeouts: SublinkTimeouts,
    options: ConnectionOptions,
    handlers: EventHandlers,
}

impl SublinkClientBuilder {
    fn new() -> Self {
        Self {
            endpoint: None,
            timeouts: SublinkTimeouts::default(),
            options: ConnectionOptions::default(),
            handlers: EventHandlers::default(),
        }
    }

    /// Set the node WebSocket endpoint (`ws://` or `wss://`).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the timeout configuration.
    pub fn timeouts(mut self, timeouts: SublinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the reconnection options.
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set connection lifecycle event handlers.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Open the connection.
    ///
    /// Suspends until the WebSocket handshake completes, then returns the
    /// ready client. Fails with [`SublinkError::ConnectTimeout`] or
    /// [`SublinkError::Transport`]; the initial connect is not retried
    /// automatically (reconnection only covers drops of an established
    /// connection), so retrying is the caller's decision.
    pub async fn connect(self) -> Result<SublinkClient> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| SublinkError::configuration("endpoint is required"))?;
        let endpoint = validate_endpoint(&endpoint)?;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let shared = SharedState::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let config = ConnectionConfig {
            endpoint: endpoint.clone(),
            timeouts: self.timeouts,
            options: self.options,
            handlers: self.handlers,
        };
        tokio::spawn(run_connection(cmd_rx, config, shared.clone(), ready_tx));

        match ready_rx.await {
            Ok(Ok(())) => Ok(SublinkClient {
                endpoint,
                cmd_tx,
                shared,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SublinkError::transport(
                "connection task exited before signalling readiness",
            )),
        }
    }
}

fn validate_endpoint(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint.trim()).map_err(|e| {
        SublinkError::Configuration(format!("invalid endpoint '{}': {}", endpoint, e))
    })?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(SublinkError::Configuration(format!(
                "unsupported endpoint scheme '{}'; expected ws or wss",
                other
            )));
        }
    }
    if url.host_str().is_none() {
        return Err(SublinkError::configuration("endpoint must include a host"));
    }
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_requires_endpoint() {
        let result = SublinkClient::builder().connect().await;
        assert!(matches!(result, Err(SublinkError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_builder_rejects_non_websocket_scheme() {
        let result = SublinkClient::builder()
            .endpoint("http://localhost:9944")
            .connect()
            .await;
        assert!(matches!(result, Err(SublinkError::Configuration(_))));
    }

    #[test]
    fn test_validate_endpoint() {
        assert_eq!(
            validate_endpoint("ws://localhost:9944").unwrap(),
            "ws://localhost:9944/"
        );
        assert!(validate_endpoint("wss://rpc.example.net:443").is_ok());
        assert!(validate_endpoint("not a url").is_err());
        assert!(validate_endpoint("ws://").is_err());
    }
}
