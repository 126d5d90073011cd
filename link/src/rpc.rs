//! JSON-RPC 2.0 wire model.
//!
//! Requests carry a client-chosen numeric id; responses echo the id with
//! either a `result` or an `error` object; subscription notifications carry
//! the server-assigned subscription id inside `params`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, SublinkError};

pub(crate) const JSONRPC_VERSION: &str = "2.0";

/// Outbound request envelope.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }

    /// Serialize to the text frame that goes on the wire.
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }
}

/// Application-level error object inside a response envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<RpcErrorObject> for SublinkError {
    fn from(err: RpcErrorObject) -> Self {
        SublinkError::Remote {
            code: err.code,
            message: err.message,
        }
    }
}

/// A parsed inbound frame.
#[derive(Debug)]
pub(crate) enum ServerMessage {
    /// Response to a request, matched by id.
    Response {
        id: u64,
        outcome: std::result::Result<Value, RpcErrorObject>,
    },
    /// Subscription push, matched by server-assigned subscription id.
    Notification {
        method: String,
        subscription: String,
        value: Value,
    },
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<Value>,
    /// `None` when the key is absent; `Some(Value::Null)` when the node
    /// answered an explicit null (a missing storage value, for instance).
    #[serde(default, deserialize_with = "present_even_if_null")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<RawNotificationParams>,
}

/// Keep a JSON `null` distinguishable from an absent key.
fn present_even_if_null<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
struct RawNotificationParams {
    subscription: Value,
    result: Value,
}

/// Servers assign subscription ids as JSON strings or numbers depending on
/// implementation; normalize both to a string key.
pub(crate) fn subscription_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse one inbound text frame.
///
/// Returns `Ok(None)` for frames that are valid JSON but not part of the
/// request/response/notification protocol; the connection loop logs and
/// skips those rather than tearing the connection down.
pub(crate) fn parse_message(text: &str) -> Result<Option<ServerMessage>> {
    let raw: RawMessage = serde_json::from_str(text)?;

    // A response must echo our numeric id and settle one way or the other.
    if let Some(id_value) = raw.id {
        if let Some(id) = id_value.as_u64() {
            if let Some(error) = raw.error {
                return Ok(Some(ServerMessage::Response {
                    id,
                    outcome: Err(error),
                }));
            }
            if let Some(result) = raw.result {
                return Ok(Some(ServerMessage::Response {
                    id,
                    outcome: Ok(result),
                }));
            }
        }
        return Ok(None);
    }

    if let (Some(method), Some(params)) = (raw.method, raw.params) {
        if let Some(subscription) = subscription_id_text(&params.subscription) {
            return Ok(Some(ServerMessage::Notification {
                method,
                subscription,
                value: params.result,
            }));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = RpcRequest::new(7, "state_getStorage", vec![json!("0x00")]);
        let value: Value = serde_json::from_str(&request.to_text().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "state_getStorage",
                "params": ["0x00"],
            })
        );
    }

    #[test]
    fn test_parse_result_response() {
        let parsed =
            parse_message(r#"{"jsonrpc":"2.0","id":3,"result":"0xdeadbeef"}"#).unwrap();
        match parsed {
            Some(ServerMessage::Response { id, outcome }) => {
                assert_eq!(id, 3);
                assert_eq!(outcome.unwrap(), json!("0xdeadbeef"));
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_null_result_response() {
        // A null result is a settled response (e.g. no value at a storage
        // key), not a frame to skip.
        let parsed = parse_message(r#"{"jsonrpc":"2.0","id":5,"result":null}"#).unwrap();
        match parsed {
            Some(ServerMessage::Response { id, outcome }) => {
                assert_eq!(id, 5);
                assert_eq!(outcome.unwrap(), Value::Null);
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let parsed = parse_message(
            r#"{"jsonrpc":"2.0","id":4,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        match parsed {
            Some(ServerMessage::Response { id, outcome }) => {
                assert_eq!(id, 4);
                let err = outcome.unwrap_err();
                assert_eq!(err.code, -32601);
                assert_eq!(err.message, "Method not found");
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_parse_notification_string_and_numeric_ids() {
        let parsed = parse_message(
            r#"{"jsonrpc":"2.0","method":"state_storage","params":{"subscription":"abc123","result":{"block":"0x01"}}}"#,
        )
        .unwrap();
        match parsed {
            Some(ServerMessage::Notification {
                method,
                subscription,
                value,
            }) => {
                assert_eq!(method, "state_storage");
                assert_eq!(subscription, "abc123");
                assert_eq!(value, json!({"block": "0x01"}));
            }
            other => panic!("unexpected parse: {:?}", other),
        }

        let parsed = parse_message(
            r#"{"jsonrpc":"2.0","method":"state_storage","params":{"subscription":42,"result":1}}"#,
        )
        .unwrap();
        match parsed {
            Some(ServerMessage::Notification { subscription, .. }) => {
                assert_eq!(subscription, "42");
            }
            other => panic!("unexpected parse: {:?}", other),
        }
    }

    #[test]
    fn test_non_protocol_frame_is_skipped() {
        assert!(parse_message(r#"{"hello":"world"}"#).unwrap().is_none());
        // A bare id with neither result nor error is not a settled response.
        assert!(parse_message(r#"{"jsonrpc":"2.0","id":9}"#).unwrap().is_none());
    }

    #[test]
    fn test_invalid_json_is_a_serialization_error() {
        let err = parse_message("not json").unwrap_err();
        assert!(matches!(err, SublinkError::Serialization(_)));
    }
}
