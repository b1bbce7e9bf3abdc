//! JSON-RPC 2.0 message shapes.
//!
//! Connections exchange raw JSON text. This module only checks that outgoing
//! requests are well formed and builds the error responses a connection
//! delivers locally when they are not, or when the transport drops requests
//! that are still waiting for an answer.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// The JSON sent is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal error, also used when the transport closes under a request.
pub const INTERNAL_ERROR: i64 = -32603;

const VERSION: &str = "2.0";

/// A request or notification (no `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Request id, absent for notifications. An explicit `null` id is
    /// `Some(Value::Null)` and still expects a response.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Positional or named parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Maps a present field to `Some`, so `null` is kept apart from absence.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl Request {
    /// Builds a request with the given id.
    #[must_use]
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: VERSION.to_owned(),
            id: Some(id.into()),
            method: method.into(),
            params: Some(params),
        }
    }

    /// Positional parameter at `index`, if any.
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&Value> {
        match &self.params {
            Some(Value::Array(items)) => items.get(index),
            _ => None,
        }
    }

    /// Serialises the request to JSON text.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Error member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Error code.
    pub code: i64,
    /// Short description.
    pub message: String,
}

/// A response to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Id of the request being answered, `null` if it could not be read.
    pub id: Value,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Successful response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: VERSION.to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: VERSION.to_owned(),
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
            }),
        }
    }

    /// Serialises the response to JSON text.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn is_valid_id(id: &Value) -> bool {
    matches!(id, Value::String(_) | Value::Number(_) | Value::Null)
}

/// Parses an outgoing message as a single JSON-RPC request.
///
/// # Errors
///
/// Returns the error response to deliver back to the sender: a parse error
/// for text that is not JSON, an invalid-request error for anything else
/// that is not a request object (batches included).
pub fn parse_request(text: &str) -> Result<Request, Response> {
    let value: Value = serde_json::from_str(text)
        .map_err(|_| Response::error(Value::Null, PARSE_ERROR, "Parse error"))?;
    let id = value
        .get("id")
        .filter(|id| is_valid_id(id))
        .cloned()
        .unwrap_or(Value::Null);
    let invalid = || Response::error(id.clone(), INVALID_REQUEST, "Invalid request");

    let Value::Object(ref object) = value else {
        return Err(invalid());
    };
    if object.get("jsonrpc").and_then(Value::as_str) != Some(VERSION) {
        return Err(invalid());
    }
    if object.get("id").is_some_and(|id| !is_valid_id(id)) {
        return Err(invalid());
    }
    if matches!(object.get("params"), Some(p) if !p.is_array() && !p.is_object()) {
        return Err(invalid());
    }
    serde_json::from_value(value).map_err(|_| invalid())
}

/// Id of `text` if it is a response (has an `id` and no `method`).
#[must_use]
pub fn response_id(text: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    if object.contains_key("method") {
        return None;
    }
    object.get("id").cloned()
}
