//! Sublink — a resilient WebSocket JSON-RPC client for Substrate-style nodes.
//!
//! One background task owns a single WebSocket connection per client and
//! multiplexes everything over it:
//!
//! - Request/response calls matched strictly by request id
//! - Server-push subscriptions routed by server-assigned subscription id
//! - Automatic reconnection with exponential backoff
//! - Transparent replay of active subscriptions after reconnect
//! - Keepalive pings with pong-timeout liveness detection
//!
//! Chain-specific encodings stay out of scope: storage keys, values,
//! metadata, and signed extrinsics cross the API as opaque hex strings.
//!
//! # Example
//!
//! ```rust,no_run
//! use sublink::SublinkClient;
//!
//! # async fn example() -> sublink::Result<()> {
//! let client = SublinkClient::connect("ws://localhost:9944").await?;
//!
//! let deposit = client.get_constant("balances", "existentialDeposit").await?;
//! println!("existential deposit: {}", deposit);
//!
//! let mut changes = client.subscribe_storage(&["0x26aa394e"]).await?;
//! while let Some(update) = changes.next().await {
//!     println!("storage changed: {}", update?);
//! }
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod connection;
mod error;
mod event_handlers;
mod options;
mod queries;
mod rpc;
mod subscription;
mod timeouts;

pub use client::{SublinkClient, SublinkClientBuilder, DEFAULT_ENDPOINT};
pub use connection::ConnectionState;
pub use error::{Result, SublinkError};
pub use event_handlers::{
    ConnectionError, DisconnectReason, EventHandlers, OnConnectCallback, OnDisconnectCallback,
    OnErrorCallback,
};
pub use options::ConnectionOptions;
pub use queries::StorageKind;
pub use rpc::RpcErrorObject;
pub use subscription::Subscription;
pub use timeouts::{SublinkTimeouts, SublinkTimeoutsBuilder};
