//! Consumer handle for a single node subscription.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::connection::ConnCmd;
use crate::error::Result;

/// A standing registration streaming server-pushed updates.
///
/// Created by [`SublinkClient::subscribe`](crate::SublinkClient::subscribe)
/// and the subscription helpers built on it. Updates arrive in the order
/// the node pushed them; after a reconnect the subscription is replayed
/// transparently, so a consumer may observe a gap but never reordered or
/// duplicated updates.
///
/// Dropping the handle cancels the registration best-effort; call
/// [`unsubscribe`](Subscription::unsubscribe) to cancel explicitly.
///
/// # Examples
///
/// ```rust,no_run
/// use sublink::SublinkClient;
///
/// # async fn example() -> sublink::Result<()> {
/// let client = SublinkClient::connect("ws://localhost:9944").await?;
///
/// let mut changes = client.subscribe_storage(&["0x26aa394e"]).await?;
/// while let Some(update) = changes.next().await {
///     println!("storage changed: {}", update?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Subscription {
    local_id: u64,
    server_id: String,
    method: String,
    event_rx: mpsc::Receiver<Result<Value>>,
    cmd_tx: mpsc::Sender<ConnCmd>,
    closed: bool,
}

impl Subscription {
    pub(crate) fn new(
        local_id: u64,
        server_id: String,
        method: String,
        event_rx: mpsc::Receiver<Result<Value>>,
        cmd_tx: mpsc::Sender<ConnCmd>,
    ) -> Self {
        Self {
            local_id,
            server_id,
            method,
            event_rx,
            cmd_tx,
            closed: false,
        }
    }

    /// The server-assigned subscription id at subscribe time.
    ///
    /// Only stable while the connection that assigned it lives; after a
    /// reconnect the client holds a fresh id internally and keeps routing
    /// updates here.
    pub fn id(&self) -> &str {
        &self.server_id
    }

    /// The subscribe method this registration was created with.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns `false` once `unsubscribe()` has been called or the stream
    /// has ended.
    pub fn is_active(&self) -> bool {
        !self.closed
    }

    /// Receive the next update.
    ///
    /// Returns `None` after the subscription is cancelled or the client is
    /// closed. An `Err` item reports why the stream is ending early
    /// (connection lost for good, client closed, or the node rejected a
    /// replay after reconnect).
    pub async fn next(&mut self) -> Option<Result<Value>> {
        if self.closed {
            return None;
        }
        match self.event_rx.recv().await {
            Some(item) => Some(item),
            None => {
                self.closed = true;
                None
            }
        }
    }

    /// Invoke `on_update` for every update, in order, until the
    /// subscription ends. Returns the first error the stream delivers.
    pub async fn for_each<F>(mut self, mut on_update: F) -> Result<()>
    where
        F: FnMut(Value),
    {
        while let Some(item) = self.next().await {
            on_update(item?);
        }
        Ok(())
    }

    /// Cancel the subscription.
    ///
    /// Sends the cancel request when connected; the handle is marked
    /// inactive locally regardless, so this never fails and calling it
    /// again (or on a subscription whose connection is already gone) is a
    /// no-op.
    pub async fn unsubscribe(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self
            .cmd_tx
            .send(ConnCmd::Unsubscribe {
                local_id: self.local_id,
            })
            .await;
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.cmd_tx.try_send(ConnCmd::Unsubscribe {
                local_id: self.local_id,
            });
        }
    }
}
