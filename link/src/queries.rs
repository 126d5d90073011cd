//! One-shot query helpers and chain subscriptions.
//!
//! Thin wrappers over [`SublinkClient::call`] and
//! [`SublinkClient::subscribe`]: each helper is a single request with a
//! fixed method name and no extra state. Storage keys, values, metadata,
//! and extrinsics cross this API as opaque `0x`-prefixed hex strings;
//! encoding and decoding them is the caller's concern.

use serde_json::{json, Value};

use crate::client::SublinkClient;
use crate::error::{Result, SublinkError};
use crate::subscription::Subscription;

const GET_CONSTANT: &str = "runtime_getConstant";
const GET_STORAGE: &str = "state_getStorage";
const GET_METADATA: &str = "state_getMetadata";
const OFFCHAIN_LOCAL_STORAGE_GET: &str = "offchain_localStorageGet";
const SUBMIT_EXTRINSIC: &str = "author_submitExtrinsic";
const SUBMIT_AND_WATCH_EXTRINSIC: &str = "author_submitAndWatchExtrinsic";
const UNWATCH_EXTRINSIC: &str = "author_unwatchExtrinsic";
const SUBSCRIBE_STORAGE: &str = "state_subscribeStorage";
const UNSUBSCRIBE_STORAGE: &str = "state_unsubscribeStorage";

/// Namespace of the node-local off-chain key/value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Survives node restarts.
    Persistent,
    /// Cleared when the node restarts.
    Local,
}

impl StorageKind {
    /// The wire name of the namespace.
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::Persistent => "PERSISTENT",
            StorageKind::Local => "LOCAL",
        }
    }
}

impl SublinkClient {
    /// Fetch a chain constant by pallet and constant name.
    ///
    /// The node must expose the constants RPC extension; raw nodes that
    /// only serve storage require deriving constants from metadata, which
    /// is outside this client's scope.
    pub async fn get_constant(&self, pallet: &str, name: &str) -> Result<Value> {
        self.call(GET_CONSTANT, vec![json!(pallet), json!(name)]).await
    }

    /// Fetch a storage value by its full hex key. `None` if the key holds
    /// no value.
    pub async fn get_storage(&self, key: &str) -> Result<Option<String>> {
        let value = self.call(GET_STORAGE, vec![json!(key)]).await?;
        decode_optional_hex(value)
    }

    /// Fetch the node's metadata blob (hex-encoded SCALE).
    pub async fn get_metadata(&self) -> Result<String> {
        let value = self.call(GET_METADATA, vec![]).await?;
        decode_hex(value)
    }

    /// Read a value from the node-local off-chain key/value store.
    pub async fn offchain_local_storage_get(
        &self,
        kind: StorageKind,
        key: &str,
    ) -> Result<Option<String>> {
        let value = self
            .call(
                OFFCHAIN_LOCAL_STORAGE_GET,
                vec![json!(kind.as_str()), json!(key)],
            )
            .await?;
        decode_optional_hex(value)
    }

    /// Submit a pre-signed extrinsic and return its transaction hash.
    ///
    /// If the connection drops before the response arrives this fails with
    /// [`SublinkError::ConnectionLost`] and the extrinsic is never resent
    /// automatically: the node may or may not have accepted it, and only
    /// the caller can decide whether resubmission is safe.
    pub async fn submit_extrinsic(&self, extrinsic: &str) -> Result<String> {
        let value = self.call(SUBMIT_EXTRINSIC, vec![json!(extrinsic)]).await?;
        decode_hex(value)
    }

    /// Submit a pre-signed extrinsic and stream its status transitions
    /// (ready, broadcast, in a block, finalized, ...) until the watch is
    /// dropped. The same no-automatic-resubmission rule as
    /// [`submit_extrinsic`](SublinkClient::submit_extrinsic) applies.
    pub async fn submit_and_watch_extrinsic(&self, extrinsic: &str) -> Result<Subscription> {
        self.subscribe(
            SUBMIT_AND_WATCH_EXTRINSIC,
            vec![json!(extrinsic)],
            UNWATCH_EXTRINSIC,
        )
        .await
    }

    /// Subscribe to changes of the given storage keys.
    pub async fn subscribe_storage(&self, keys: &[&str]) -> Result<Subscription> {
        self.subscribe(SUBSCRIBE_STORAGE, vec![json!(keys)], UNSUBSCRIBE_STORAGE)
            .await
    }
}

fn decode_hex(value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(SublinkError::Serialization(format!(
            "expected hex string, got {}",
            other
        ))),
    }
}

fn decode_optional_hex(value: Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(SublinkError::Serialization(format!(
            "expected hex string or null, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_kind_wire_names() {
        assert_eq!(StorageKind::Persistent.as_str(), "PERSISTENT");
        assert_eq!(StorageKind::Local.as_str(), "LOCAL");
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex(json!("0x0400")).unwrap(), "0x0400");
        assert!(matches!(
            decode_hex(json!(42)),
            Err(SublinkError::Serialization(_))
        ));
    }

    #[test]
    fn test_decode_optional_hex() {
        assert_eq!(decode_optional_hex(json!(null)).unwrap(), None);
        assert_eq!(
            decode_optional_hex(json!("0x2a")).unwrap(),
            Some("0x2a".to_string())
        );
        assert!(decode_optional_hex(json!({"unexpected": true})).is_err());
    }
}
