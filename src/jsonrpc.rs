//! JSON-RPC 2.0 message codec
//!
//! Pure functions for building, validating, and classifying JSON-RPC 2.0
//! messages as raw [`serde_json::Value`]s. The endpoint traffics in raw
//! values so that malformed peer input can be diagnosed before any typed
//! parsing happens; everything here is stateless and never suspends.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::JsonRpcError;

/// The JSON-RPC version. MUST be "2.0".
pub const JSONRPC_VERSION: &str = "2.0";

/// Method name of the cancellation notification handled by the endpoint.
pub const CANCEL_REQUEST: &str = "$/cancelRequest";

/// Request ID - can be string or number per JSON-RPC spec
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl RequestId {
    /// Extract a request id from a raw JSON value.
    ///
    /// Returns `None` for null and for anything that is not a string or an
    /// integer.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RequestId::Number),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestId::Number(n) => json!(n),
            RequestId::String(s) => json!(s),
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<i32> for RequestId {
    fn from(n: i32) -> Self {
        RequestId::Number(n as i64)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// Build a request message. `params` is omitted entirely when `None`.
pub fn make_request(id: impl Into<RequestId>, method: &str, params: Option<Value>) -> Value {
    let mut msg = json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id.into().to_value(),
        "method": method,
    });
    if let Some(params) = params {
        msg["params"] = params;
    }
    msg
}

/// Build a notification message (a request without an id).
pub fn make_notification(method: &str, params: Option<Value>) -> Value {
    let mut msg = json!({
        "jsonrpc": JSONRPC_VERSION,
        "method": method,
    });
    if let Some(params) = params {
        msg["params"] = params;
    }
    msg
}

/// Build a success response.
pub fn make_result(id: &RequestId, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id.to_value(),
        "result": result,
    })
}

/// Build an error response.
///
/// The id is echoed as given; `None` produces a null id, which is how parse
/// failures with no recoverable id are reported.
pub fn make_error(id: Option<&RequestId>, error: &JsonRpcError) -> Value {
    let mut err = json!({
        "code": error.code,
        "message": error.message,
    });
    if let Some(data) = &error.data {
        err["data"] = data.clone();
    }
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id.map(RequestId::to_value).unwrap_or(Value::Null),
        "error": err,
    })
}

fn valid_id(value: &Value) -> bool {
    match value {
        Value::String(_) => true,
        Value::Number(n) => n.as_i64().is_some() || n.as_u64().is_some(),
        _ => false,
    }
}

/// Validate a message as a JSON-RPC request or notification.
pub fn validate_request(message: &Value) -> std::result::Result<(), String> {
    let Some(obj) = message.as_object() else {
        return Err("request must be a JSON object".to_string());
    };

    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        _ => return Err(format!("jsonrpc version must be the literal \"{}\"", JSONRPC_VERSION)),
    }

    match obj.get("method") {
        Some(Value::String(_)) => {}
        Some(_) => return Err("method must be a string".to_string()),
        None => return Err("method is required".to_string()),
    }

    match obj.get("params") {
        None | Some(Value::Object(_)) | Some(Value::Array(_)) => {}
        Some(_) => return Err("params must be an object or an array".to_string()),
    }

    match obj.get("id") {
        // a null id is treated as absent: the message is a notification
        None | Some(Value::Null) => {}
        Some(id) if valid_id(id) => {}
        Some(_) => return Err("id must be a string or an integer".to_string()),
    }

    Ok(())
}

/// Validate a message as a JSON-RPC response.
pub fn validate_response(message: &Value) -> std::result::Result<(), String> {
    let Some(obj) = message.as_object() else {
        return Err("response must be a JSON object".to_string());
    };

    match obj.get("jsonrpc") {
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        _ => return Err(format!("jsonrpc version must be the literal \"{}\"", JSONRPC_VERSION)),
    }

    match obj.get("id") {
        None => return Err("id is required (null is allowed)".to_string()),
        Some(Value::Null) => {}
        Some(id) if valid_id(id) => {}
        Some(_) => return Err("id must be a string, an integer, or null".to_string()),
    }

    match (obj.get("result"), obj.get("error")) {
        (Some(_), None) => Ok(()),
        (None, Some(err)) => {
            let Some(err) = err.as_object() else {
                return Err("error must be an object".to_string());
            };
            if !err.get("code").is_some_and(|c| c.as_i64().is_some()) {
                return Err("error code must be an integer".to_string());
            }
            if !err.get("message").is_some_and(Value::is_string) {
                return Err("error message must be a string".to_string());
            }
            Ok(())
        }
        _ => Err("response must carry exactly one of result or error".to_string()),
    }
}

/// True if the message has the shape of a request. Notifications are requests
/// without an id, so `is_request` holds for them as well.
pub fn is_request(message: &Value) -> bool {
    message.get("method").is_some_and(Value::is_string)
}

/// True if the message is a request without an id.
pub fn is_notification(message: &Value) -> bool {
    is_request(message) && !message.get("id").is_some_and(|id| !id.is_null())
}

/// True if the message has the shape of a response (an id plus a result or
/// an error).
pub fn is_response(message: &Value) -> bool {
    message.get("id").is_some()
        && (message.get("result").is_some() || message.get("error").is_some())
        && message.get("method").is_none()
}

/// True if the message is a batch (an array of messages).
pub fn is_batch(message: &Value) -> bool {
    message.is_array()
}
