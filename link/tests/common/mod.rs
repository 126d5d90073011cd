#![allow(dead_code)]
//! Shared mock-node helpers for sublink integration tests.
//!
//! Each test spawns a tailored in-process WebSocket server on an ephemeral
//! port and scripts its side of the JSON-RPC conversation with these
//! helpers.

use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use futures_util::{SinkExt, StreamExt};
use sublink::{ConnectionOptions, SublinkClient, SublinkClientBuilder, SublinkTimeouts};

pub type ServerWs = WebSocketStream<TcpStream>;

/// Bind an ephemeral port and return the listener plus its ws:// URL.
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// Accept the next WebSocket connection.
pub async fn accept_ws(listener: &TcpListener) -> ServerWs {
    let (stream, _) = listener.accept().await.expect("accept connection");
    accept_async(stream).await.expect("websocket handshake")
}

/// A request as seen by the mock node.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

/// Read frames until the next JSON-RPC request arrives. Control frames are
/// skipped; the underlying library answers pings on its own.
pub async fn read_request(ws: &mut ServerWs) -> IncomingRequest {
    loop {
        let frame = ws
            .next()
            .await
            .expect("connection closed while awaiting a request")
            .expect("websocket error while awaiting a request");
        if let Message::Text(text) = frame {
            let value: Value = serde_json::from_str(text.as_str()).expect("request is JSON");
            return IncomingRequest {
                id: value["id"].as_u64().expect("request has a numeric id"),
                method: value["method"]
                    .as_str()
                    .expect("request has a method")
                    .to_string(),
                params: value["params"].as_array().cloned().unwrap_or_default(),
            };
        }
    }
}

/// Send a successful response for `id`.
pub async fn respond_result(ws: &mut ServerWs, id: u64, result: Value) {
    let frame = json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string();
    ws.send(Message::Text(frame.into())).await.expect("send response");
}

/// Send an error response for `id`.
pub async fn respond_error(ws: &mut ServerWs, id: u64, code: i64, message: &str) {
    let frame = json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": code, "message": message},
    })
    .to_string();
    ws.send(Message::Text(frame.into())).await.expect("send error response");
}

/// Push a subscription notification.
pub async fn notify(ws: &mut ServerWs, method: &str, subscription: &str, result: Value) {
    let frame = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": {"subscription": subscription, "result": result},
    })
    .to_string();
    ws.send(Message::Text(frame.into())).await.expect("send notification");
}

/// Builder preconfigured for tests: short connect timeout, keepalive off,
/// quick reconnection with a generous attempt budget.
pub fn test_client(url: &str) -> SublinkClientBuilder {
    SublinkClient::builder()
        .endpoint(url)
        .timeouts(
            SublinkTimeouts::builder()
                .connect_timeout(Duration::from_secs(2))
                .keepalive_interval(Duration::ZERO)
                .build(),
        )
        .connection_options(
            ConnectionOptions::new()
                .with_reconnect_delay_ms(10)
                .with_max_reconnect_delay_ms(100)
                .with_max_reconnect_attempts(Some(20)),
        )
}

/// Wrap a future in the standard per-test timeout.
pub async fn within<T, F>(future: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("test step timed out")
}
