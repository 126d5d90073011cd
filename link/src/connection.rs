//! Shared WebSocket connection manager.
//!
//! A single connection multiplexes all requests and subscriptions.
//! Handles:
//!
//! - Request/response matching by request id (never by arrival order)
//! - Notification routing to the correct subscription by server-assigned id
//! - Automatic reconnection with exponential backoff
//! - Re-subscription of all active subscriptions after reconnect
//! - Keepalive pings with pong-timeout liveness checking
//!
//! The background task spawned by [`run_connection`] owns the WebSocket
//! stream exclusively; the public client handle talks to it over an mpsc
//! command channel. The request-id counter, the pending-request map, and
//! the subscription registry live inside the task, so no locking is needed
//! however many tasks share the client.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::{Result, SublinkError};
use crate::event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
use crate::options::ConnectionOptions;
use crate::rpc::{parse_message, subscription_id_text, RpcRequest, ServerMessage};
use crate::timeouts::SublinkTimeouts;

pub(crate) type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;

/// Capacity of each subscription's event channel. When full, the connection
/// task pauses reads, applying back-pressure to the node.
pub(crate) const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Sleep deadline far enough away to be effectively "never".
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

// ── Connection state ────────────────────────────────────────────────────────

/// Lifecycle state of the logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been attempted yet.
    Disconnected,
    /// The initial WebSocket handshake is in progress.
    Connecting,
    /// Connected; requests and subscriptions flow.
    Ready,
    /// The connection dropped; reconnection attempts are running.
    Reconnecting,
    /// Closed for good, either explicitly or after reconnection gave up.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Ready => "ready",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// State shared between the client handle and the background task.
#[derive(Clone, Debug)]
pub(crate) struct SharedState {
    state: Arc<watch::Sender<ConnectionState>>,
    user_closed: Arc<AtomicBool>,
}

impl SharedState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            state: Arc::new(tx),
            user_closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn get(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn set(&self, next: ConnectionState) {
        self.state.send_replace(next);
    }

    pub fn mark_user_closed(&self) {
        self.user_closed.store(true, Ordering::SeqCst);
    }

    /// Error to report for operations that can no longer reach the task:
    /// `ClientClosed` after an explicit close, `ConnectionLost` after
    /// reconnection gave up.
    pub fn closed_error(&self) -> SublinkError {
        if self.user_closed.load(Ordering::SeqCst) {
            SublinkError::ClientClosed
        } else {
            SublinkError::ConnectionLost
        }
    }

    pub async fn wait_for(&self, target: ConnectionState) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state == target).await;
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Commands sent from the public API to the background connection task.
pub(crate) enum ConnCmd {
    /// Issue a request and resolve `result_tx` with the matching response.
    Call {
        method: String,
        params: Vec<Value>,
        result_tx: oneshot::Sender<Result<Value>>,
    },
    /// Register a subscription over the shared connection.
    Subscribe {
        request: SubscribeRequest,
        result_tx: oneshot::Sender<Result<SubscribeAck>>,
    },
    /// Cancel a subscription. Unknown ids are a no-op: local ids are never
    /// reused, so a late cancel cannot hit anyone else's registration.
    Unsubscribe { local_id: u64 },
    /// Gracefully shut the connection down.
    Shutdown,
}

pub(crate) struct SubscribeRequest {
    pub method: String,
    pub params: Vec<Value>,
    pub unsubscribe_method: String,
    pub event_tx: mpsc::Sender<Result<Value>>,
}

pub(crate) struct SubscribeAck {
    pub local_id: u64,
    pub server_id: String,
}

/// Everything needed to (re)establish and drive the connection.
pub(crate) struct ConnectionConfig {
    pub endpoint: String,
    pub timeouts: SublinkTimeouts,
    pub options: ConnectionOptions,
    pub handlers: EventHandlers,
}

// ── Task-owned state ────────────────────────────────────────────────────────

/// A request that has gone out on the wire and awaits its response.
enum Pending {
    Call(oneshot::Sender<Result<Value>>),
    Subscribe {
        local_id: u64,
        result_tx: oneshot::Sender<Result<SubscribeAck>>,
    },
    Resubscribe {
        local_id: u64,
        unsubscribe_method: String,
    },
    Unsubscribe { local_id: u64 },
}

/// Registry entry for an active subscription.
struct SubEntry {
    method: String,
    params: Vec<Value>,
    unsubscribe_method: String,
    /// Server-assigned id for the current connection incarnation.
    /// `None` while a (re)subscribe is in flight.
    server_id: Option<String>,
    event_tx: mpsc::Sender<Result<Value>>,
}

struct TaskState {
    pending: HashMap<u64, Pending>,
    subs: HashMap<u64, SubEntry>,
    /// Server subscription id → local id, rebuilt per connection.
    server_index: HashMap<String, u64>,
    /// Work that arrived while reconnecting, flushed once reconnected.
    queued: VecDeque<ConnCmd>,
    next_request_id: u64,
    next_local_id: u64,
}

impl TaskState {
    fn new() -> Self {
        Self {
            pending: HashMap::new(),
            subs: HashMap::new(),
            server_index: HashMap::new(),
            queued: VecDeque::new(),
            next_request_id: 1,
            next_local_id: 1,
        }
    }

    fn fresh_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn fresh_local_id(&mut self) -> u64 {
        let id = self.next_local_id;
        self.next_local_id += 1;
        id
    }
}

// ── Background task ─────────────────────────────────────────────────────────

/// Open the WebSocket, honoring the connect timeout.
async fn establish(
    endpoint: &str,
    timeouts: &SublinkTimeouts,
    handlers: &EventHandlers,
) -> Result<WsStream> {
    log::debug!("[sublink] opening websocket to {}", endpoint);
    let connect = connect_async(endpoint);
    let result = if SublinkTimeouts::is_no_timeout(timeouts.connect_timeout) {
        Ok(connect.await)
    } else {
        tokio::time::timeout(timeouts.connect_timeout, connect).await
    };
    match result {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => {
            let msg = format!("connection failed: {}", e);
            handlers.emit_error(ConnectionError::new(msg.clone(), true));
            Err(SublinkError::Transport(msg))
        }
        Err(_) => {
            handlers.emit_error(ConnectionError::new(
                format!("connect timeout ({:?})", timeouts.connect_timeout),
                true,
            ));
            Err(SublinkError::ConnectTimeout)
        }
    }
}

/// Drive the connection for a client. Spawned by the builder; exits when the
/// client closes, all handles drop, or reconnection gives up.
pub(crate) async fn run_connection(
    mut cmd_rx: mpsc::Receiver<ConnCmd>,
    config: ConnectionConfig,
    shared: SharedState,
    ready_tx: oneshot::Sender<Result<()>>,
) {
    shared.set(ConnectionState::Connecting);
    let mut ws = match establish(&config.endpoint, &config.timeouts, &config.handlers).await {
        Ok(stream) => stream,
        Err(e) => {
            shared.set(ConnectionState::Closed);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    shared.set(ConnectionState::Ready);
    config.handlers.emit_connect();
    log::info!("[sublink] connected to {}", config.endpoint);
    let _ = ready_tx.send(Ok(()));

    let mut st = TaskState::new();

    loop {
        match connected_phase(&mut ws, &mut cmd_rx, &mut st, &config.timeouts).await {
            PhaseEnd::Shutdown => {
                graceful_close(&mut ws, &mut st).await;
                drain_with_error(&mut st, || SublinkError::ClientClosed);
                config
                    .handlers
                    .emit_disconnect(DisconnectReason::new("client closed"));
                shared.set(ConnectionState::Closed);
                return;
            }
            PhaseEnd::Lost(lost_reason) => {
                let mut reason = lost_reason;
                loop {
                    log::warn!("[sublink] connection lost: {}", reason);
                    config
                        .handlers
                        .emit_disconnect(DisconnectReason::new(reason.clone()));
                    on_connection_lost(&mut st);

                    match reconnect_phase(&mut cmd_rx, &mut st, &config, &shared).await {
                        ReconnectOutcome::Shutdown => {
                            drain_with_error(&mut st, || SublinkError::ClientClosed);
                            config
                                .handlers
                                .emit_disconnect(DisconnectReason::new("client closed"));
                            shared.set(ConnectionState::Closed);
                            return;
                        }
                        ReconnectOutcome::GaveUp => {
                            config.handlers.emit_error(ConnectionError::new(
                                "reconnection attempts exhausted",
                                false,
                            ));
                            drain_with_error(&mut st, || SublinkError::ConnectionLost);
                            shared.set(ConnectionState::Closed);
                            return;
                        }
                        ReconnectOutcome::Connected(mut stream) => {
                            shared.set(ConnectionState::Ready);
                            config.handlers.emit_connect();
                            match restore_session(&mut stream, &mut st).await {
                                Ok(()) => {
                                    ws = stream;
                                    break;
                                }
                                Err(restore_reason) => {
                                    reason = restore_reason;
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

enum PhaseEnd {
    Lost(String),
    Shutdown,
}

/// Event loop while the connection is up: multiplex commands, inbound
/// frames, keepalive pings, and the pong liveness deadline.
async fn connected_phase(
    ws: &mut WsStream,
    cmd_rx: &mut mpsc::Receiver<ConnCmd>,
    st: &mut TaskState,
    timeouts: &SublinkTimeouts,
) -> PhaseEnd {
    let has_keepalive = !timeouts.keepalive_interval.is_zero();
    let keepalive_dur = if has_keepalive {
        timeouts.keepalive_interval
    } else {
        FAR_FUTURE
    };
    let has_pong_timeout = has_keepalive && !timeouts.pong_timeout.is_zero();
    let mut awaiting_pong = false;
    let mut idle_deadline = Instant::now() + keepalive_dur;
    let mut pong_deadline = Instant::now() + FAR_FUTURE;

    loop {
        let idle_sleep = tokio::time::sleep_until(idle_deadline);
        tokio::pin!(idle_sleep);
        let pong_sleep = tokio::time::sleep_until(pong_deadline);
        tokio::pin!(pong_sleep);

        tokio::select! {
            biased;

            // No frame arrived since our Ping: the peer is gone.
            _ = &mut pong_sleep, if has_pong_timeout && awaiting_pong => {
                return PhaseEnd::Lost(format!(
                    "no pong within {:?}, treating connection as dead",
                    timeouts.pong_timeout,
                ));
            }

            cmd = cmd_rx.recv() => {
                let cmd = match cmd {
                    Some(cmd) => cmd,
                    // All client handles dropped.
                    None => return PhaseEnd::Shutdown,
                };
                match handle_command(cmd, ws, st).await {
                    Ok(CmdFlow::Continue) => {}
                    Ok(CmdFlow::Shutdown) => return PhaseEnd::Shutdown,
                    Err(reason) => return PhaseEnd::Lost(reason),
                }
            }

            _ = &mut idle_sleep, if has_keepalive && !awaiting_pong => {
                if let Err(e) = ws.send(Message::Ping(Bytes::new())).await {
                    return PhaseEnd::Lost(format!("keepalive ping failed: {}", e));
                }
                if has_pong_timeout {
                    awaiting_pong = true;
                    pong_deadline = Instant::now() + timeouts.pong_timeout;
                }
                idle_deadline = Instant::now() + keepalive_dur;
            }

            frame = ws.next() => {
                // Any frame proves the connection is alive.
                idle_deadline = Instant::now() + keepalive_dur;
                if awaiting_pong {
                    awaiting_pong = false;
                    pong_deadline = Instant::now() + FAR_FUTURE;
                }

                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match parse_message(&text) {
                            Ok(Some(message)) => dispatch_message(message, ws, st).await,
                            Ok(None) => log::debug!("[sublink] ignoring non-protocol frame"),
                            Err(e) => log::warn!("[sublink] failed to parse frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        log::warn!("[sublink] ignoring unexpected binary frame");
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        let reason = match frame {
                            Some(f) => format!(
                                "server closed connection: {} (code: {})",
                                f.reason,
                                u16::from(f.code),
                            ),
                            None => "server closed connection".to_string(),
                        };
                        return PhaseEnd::Lost(reason);
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => return PhaseEnd::Lost(format!("websocket error: {}", e)),
                    None => return PhaseEnd::Lost("websocket stream ended".to_string()),
                }
            }
        }
    }
}

enum CmdFlow {
    Continue,
    Shutdown,
}

/// Execute one command against the live connection.
///
/// On a send failure the unsent `Call`/`Subscribe` is pushed onto the queue
/// so it goes out after reconnection: it never reached the wire, so
/// resending it later cannot duplicate a side effect.
async fn handle_command(
    cmd: ConnCmd,
    ws: &mut WsStream,
    st: &mut TaskState,
) -> std::result::Result<CmdFlow, String> {
    match cmd {
        ConnCmd::Call {
            method,
            params,
            result_tx,
        } => {
            let id = st.fresh_request_id();
            let request = RpcRequest::new(id, method.as_str(), params);
            let text = match request.to_text() {
                Ok(text) => text,
                Err(e) => {
                    let _ = result_tx.send(Err(e));
                    return Ok(CmdFlow::Continue);
                }
            };
            if let Err(e) = ws.send(Message::Text(text.into())).await {
                st.queued.push_back(ConnCmd::Call {
                    method,
                    params: request.params,
                    result_tx,
                });
                return Err(format!("send failed: {}", e));
            }
            st.pending.insert(id, Pending::Call(result_tx));
            Ok(CmdFlow::Continue)
        }

        ConnCmd::Subscribe { request, result_tx } => {
            let id = st.fresh_request_id();
            let rpc = RpcRequest::new(id, request.method.as_str(), request.params.clone());
            let text = match rpc.to_text() {
                Ok(text) => text,
                Err(e) => {
                    let _ = result_tx.send(Err(e));
                    return Ok(CmdFlow::Continue);
                }
            };
            if let Err(e) = ws.send(Message::Text(text.into())).await {
                st.queued.push_back(ConnCmd::Subscribe { request, result_tx });
                return Err(format!("send failed: {}", e));
            }
            let local_id = st.fresh_local_id();
            st.subs.insert(
                local_id,
                SubEntry {
                    method: request.method,
                    params: request.params,
                    unsubscribe_method: request.unsubscribe_method,
                    server_id: None,
                    event_tx: request.event_tx,
                },
            );
            st.pending.insert(id, Pending::Subscribe { local_id, result_tx });
            Ok(CmdFlow::Continue)
        }

        ConnCmd::Unsubscribe { local_id } => {
            remove_subscription(local_id, ws, st).await;
            Ok(CmdFlow::Continue)
        }

        ConnCmd::Shutdown => Ok(CmdFlow::Shutdown),
    }
}

/// Drop a subscription registration and send a best-effort cancel request.
async fn remove_subscription(local_id: u64, ws: &mut WsStream, st: &mut TaskState) {
    let Some(entry) = st.subs.remove(&local_id) else {
        return;
    };
    let Some(server_id) = entry.server_id else {
        return;
    };
    st.server_index.remove(&server_id);
    send_unsubscribe(&entry.unsubscribe_method, server_id, local_id, ws, st).await;
}

async fn send_unsubscribe(
    unsubscribe_method: &str,
    server_id: String,
    local_id: u64,
    ws: &mut WsStream,
    st: &mut TaskState,
) {
    let id = st.fresh_request_id();
    let request = RpcRequest::new(id, unsubscribe_method, vec![Value::String(server_id)]);
    match request.to_text() {
        Ok(text) => {
            if ws.send(Message::Text(text.into())).await.is_ok() {
                st.pending.insert(id, Pending::Unsubscribe { local_id });
            }
            // A failed send means the connection is dying; the server-side
            // registration dies with it.
        }
        Err(e) => log::warn!("[sublink] failed to encode unsubscribe: {}", e),
    }
}

/// Route one parsed inbound message to its pending request or subscription.
async fn dispatch_message(message: ServerMessage, ws: &mut WsStream, st: &mut TaskState) {
    match message {
        ServerMessage::Response { id, outcome } => {
            let Some(pending) = st.pending.remove(&id) else {
                log::warn!("[sublink] response for unknown request id {}", id);
                return;
            };
            match pending {
                Pending::Call(result_tx) => {
                    let _ = result_tx.send(outcome.map_err(Into::into));
                }

                Pending::Subscribe { local_id, result_tx } => match outcome {
                    Ok(value) => match subscription_id_text(&value) {
                        Some(server_id) => {
                            st.server_index.insert(server_id.clone(), local_id);
                            if let Some(entry) = st.subs.get_mut(&local_id) {
                                entry.server_id = Some(server_id.clone());
                            }
                            let ack = SubscribeAck { local_id, server_id };
                            if result_tx.send(Ok(ack)).is_err() {
                                // Caller gave up while the subscribe was in
                                // flight; cancel on the node.
                                remove_subscription(local_id, ws, st).await;
                            }
                        }
                        None => {
                            st.subs.remove(&local_id);
                            let _ = result_tx.send(Err(SublinkError::Serialization(format!(
                                "subscribe ack is not a subscription id: {}",
                                value
                            ))));
                        }
                    },
                    Err(err) => {
                        st.subs.remove(&local_id);
                        let _ = result_tx.send(Err(err.into()));
                    }
                },

                Pending::Resubscribe {
                    local_id,
                    unsubscribe_method,
                } => match outcome {
                    Ok(value) => match subscription_id_text(&value) {
                        Some(server_id) => {
                            if st.subs.contains_key(&local_id) {
                                log::info!(
                                    "[sublink] re-subscribed {} as {}",
                                    local_id,
                                    server_id,
                                );
                                st.server_index.insert(server_id.clone(), local_id);
                                if let Some(entry) = st.subs.get_mut(&local_id) {
                                    entry.server_id = Some(server_id);
                                }
                            } else {
                                // Unsubscribed while the resubscribe was in
                                // flight; cancel the fresh registration.
                                send_unsubscribe(
                                    &unsubscribe_method,
                                    server_id,
                                    local_id,
                                    ws,
                                    st,
                                )
                                .await;
                            }
                        }
                        None => {
                            if let Some(entry) = st.subs.remove(&local_id) {
                                let _ = entry.event_tx.try_send(Err(
                                    SublinkError::Serialization(format!(
                                        "resubscribe ack is not a subscription id: {}",
                                        value
                                    )),
                                ));
                            }
                        }
                    },
                    Err(err) => {
                        log::warn!(
                            "[sublink] node rejected resubscribe for {}: {}",
                            local_id,
                            err.message,
                        );
                        if let Some(entry) = st.subs.remove(&local_id) {
                            let _ = entry.event_tx.try_send(Err(err.into()));
                        }
                    }
                },

                Pending::Unsubscribe { local_id } => {
                    log::debug!("[sublink] unsubscribe acknowledged for {}", local_id);
                }
            }
        }

        ServerMessage::Notification {
            method,
            subscription,
            value,
        } => {
            let Some(&local_id) = st.server_index.get(&subscription) else {
                log::debug!(
                    "[sublink] notification for unknown subscription {} ({})",
                    subscription,
                    method,
                );
                return;
            };
            let receiver_gone = match st.subs.get(&local_id) {
                Some(entry) => entry.event_tx.send(Ok(value)).await.is_err(),
                None => false,
            };
            if receiver_gone {
                // Consumer handle dropped without unsubscribing.
                remove_subscription(local_id, ws, st).await;
            }
        }
    }
}

/// Fail in-flight requests and invalidate server-side subscription ids.
/// Subscription registrations survive for replay after reconnect.
fn on_connection_lost(st: &mut TaskState) {
    for (_, pending) in st.pending.drain() {
        match pending {
            Pending::Call(result_tx) => {
                let _ = result_tx.send(Err(SublinkError::ConnectionLost));
            }
            Pending::Subscribe { local_id, result_tx } => {
                st.subs.remove(&local_id);
                let _ = result_tx.send(Err(SublinkError::ConnectionLost));
            }
            Pending::Resubscribe { .. } | Pending::Unsubscribe { .. } => {}
        }
    }
    st.server_index.clear();
    for entry in st.subs.values_mut() {
        entry.server_id = None;
    }
}

/// Resolve everything still outstanding with `make_err` and drop the
/// subscription channels, ending their streams.
fn drain_with_error(st: &mut TaskState, make_err: fn() -> SublinkError) {
    for (_, pending) in st.pending.drain() {
        match pending {
            Pending::Call(result_tx) => {
                let _ = result_tx.send(Err(make_err()));
            }
            Pending::Subscribe { result_tx, .. } => {
                let _ = result_tx.send(Err(make_err()));
            }
            Pending::Resubscribe { .. } | Pending::Unsubscribe { .. } => {}
        }
    }
    while let Some(cmd) = st.queued.pop_front() {
        match cmd {
            ConnCmd::Call { result_tx, .. } => {
                let _ = result_tx.send(Err(make_err()));
            }
            ConnCmd::Subscribe { result_tx, .. } => {
                let _ = result_tx.send(Err(make_err()));
            }
            ConnCmd::Unsubscribe { .. } | ConnCmd::Shutdown => {}
        }
    }
    for (_, entry) in st.subs.drain() {
        let _ = entry.event_tx.try_send(Err(make_err()));
    }
    st.server_index.clear();
}

enum ReconnectOutcome {
    Connected(WsStream),
    Shutdown,
    GaveUp,
}

/// Backoff-and-retry loop. Keeps servicing commands while sleeping:
/// new work is queued, cancels take effect locally, shutdown aborts.
async fn reconnect_phase(
    cmd_rx: &mut mpsc::Receiver<ConnCmd>,
    st: &mut TaskState,
    config: &ConnectionConfig,
    shared: &SharedState,
) -> ReconnectOutcome {
    shared.set(ConnectionState::Reconnecting);
    if !config.options.auto_reconnect {
        log::warn!("[sublink] auto-reconnect disabled, closing");
        return ReconnectOutcome::GaveUp;
    }

    let mut attempt: u32 = 0;
    loop {
        if config.options.attempts_exhausted(attempt) {
            log::warn!(
                "[sublink] giving up after {} reconnection attempt(s)",
                attempt,
            );
            return ReconnectOutcome::GaveUp;
        }

        let delay = config.options.backoff_delay(attempt);
        log::info!(
            "[sublink] reconnecting to {} in {:?} (attempt {})",
            config.endpoint,
            delay,
            attempt + 1,
        );

        let sleep_fut = tokio::time::sleep(delay);
        tokio::pin!(sleep_fut);
        loop {
            tokio::select! {
                biased;
                cmd = cmd_rx.recv() => match cmd {
                    Some(ConnCmd::Shutdown) | None => return ReconnectOutcome::Shutdown,
                    Some(ConnCmd::Unsubscribe { local_id }) => {
                        st.subs.remove(&local_id);
                    }
                    Some(other) => st.queued.push_back(other),
                },
                _ = &mut sleep_fut => break,
            }
        }

        match establish(&config.endpoint, &config.timeouts, &config.handlers).await {
            Ok(stream) => {
                log::info!("[sublink] reconnected to {}", config.endpoint);
                return ReconnectOutcome::Connected(stream);
            }
            Err(e) => {
                log::warn!(
                    "[sublink] reconnection attempt {} failed: {}",
                    attempt + 1,
                    e,
                );
                attempt += 1;
            }
        }
    }
}

/// After reconnecting: replay every active subscription with its original
/// method and params, then flush the work queued during the outage.
async fn restore_session(
    ws: &mut WsStream,
    st: &mut TaskState,
) -> std::result::Result<(), String> {
    let local_ids: Vec<u64> = st.subs.keys().copied().collect();
    if !local_ids.is_empty() {
        log::info!(
            "[sublink] re-subscribing {} active subscription(s)",
            local_ids.len(),
        );
    }
    for local_id in local_ids {
        let (method, params, unsubscribe_method) = match st.subs.get(&local_id) {
            Some(entry) => (
                entry.method.clone(),
                entry.params.clone(),
                entry.unsubscribe_method.clone(),
            ),
            None => continue,
        };
        let id = st.fresh_request_id();
        let request = RpcRequest::new(id, method.as_str(), params);
        match request.to_text() {
            Ok(text) => {
                if let Err(e) = ws.send(Message::Text(text.into())).await {
                    return Err(format!("send failed during resubscribe: {}", e));
                }
                st.pending.insert(
                    id,
                    Pending::Resubscribe {
                        local_id,
                        unsubscribe_method,
                    },
                );
            }
            Err(e) => log::warn!("[sublink] failed to encode resubscribe: {}", e),
        }
    }

    while let Some(cmd) = st.queued.pop_front() {
        match handle_command(cmd, ws, st).await {
            Ok(_) => {}
            Err(reason) => return Err(reason),
        }
    }
    Ok(())
}

/// Best-effort server-side cleanup before dropping the socket.
async fn graceful_close(ws: &mut WsStream, st: &mut TaskState) {
    let active: Vec<(String, String, u64)> = st
        .subs
        .iter()
        .filter_map(|(local_id, entry)| {
            entry
                .server_id
                .clone()
                .map(|sid| (entry.unsubscribe_method.clone(), sid, *local_id))
        })
        .collect();
    for (method, server_id, local_id) in active {
        send_unsubscribe(&method, server_id, local_id, ws, st).await;
    }
    let _ = ws.close(None).await;
}
