//! Response envelope
//!
//! The backend wraps structured responses as `{code, message, data}` with
//! `code == 200` meaning success. Bodies without that shape pass through.

use super::error::{ClientError, ClientResult};
use serde_json::Value;

/// Application code signalling success
pub const SUCCESS_CODE: i64 = 200;

const DEFAULT_FAILURE_MESSAGE: &str = "Request failed";

/// Whether a body has the `{code, data}` envelope shape
pub fn is_envelope(body: &Value) -> bool {
    body.as_object()
        .map(|obj| obj.contains_key("code") && obj.contains_key("data"))
        .unwrap_or(false)
}

/// Unwrap an envelope into its payload, or return a non-enveloped body as is
pub fn unwrap_envelope(body: Value) -> ClientResult<Value> {
    if !is_envelope(&body) {
        return Ok(body);
    }

    let Value::Object(mut obj) = body else {
        return Ok(body);
    };

    let code = obj.get("code").and_then(Value::as_i64);
    if code == Some(SUCCESS_CODE) {
        return Ok(obj.remove("data").unwrap_or(Value::Null));
    }

    let message = obj
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string();

    Err(ClientError::Business {
        code: code.unwrap_or_default(),
        message,
    })
}
