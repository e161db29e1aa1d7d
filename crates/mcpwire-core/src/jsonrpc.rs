//! # JSON-RPC 2.0 envelopes
//!
//! Wire types for the four envelope shapes (request, notification, response, error)
//! plus batches. Batches are plain JSON arrays and decode in order.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// JSON-RPC version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Key under `params` that carries request metadata
pub const META_KEY: &str = "_meta";

/// Key under `params._meta` that carries a progress token
pub const PROGRESS_TOKEN_KEY: &str = "progressToken";

/// JSON-RPC version type (always "2.0")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{version}'"
            )))
        }
    }
}

/// Request identifier - can be string or number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String identifier
    String(String),
    /// Numeric identifier
    Number(i64),
}

impl RequestId {
    /// Numeric value of the id, if it is a number
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(_) => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for RequestId {
    fn from(n: i32) -> Self {
        Self::Number(i64::from(n))
    }
}

/// JSON-RPC request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Request identifier
    pub id: RequestId,
    /// Request method name
    pub method: String,
    /// Request parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request
    pub fn new(method: impl Into<String>, params: Option<Value>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// The `params._meta` object, if present
    pub fn meta(&self) -> Option<&serde_json::Map<String, Value>> {
        meta_of(self.params.as_ref())
    }

    /// The progress token the requester asked to be notified under
    pub fn progress_token(&self) -> Option<&Value> {
        self.meta().and_then(|meta| meta.get(PROGRESS_TOKEN_KEY))
    }
}

/// JSON-RPC notification message (no response expected)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Notification method name
    pub method: String,
    /// Notification parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }

    /// Create a notification with serializable parameters
    pub fn with_params<P: Serialize>(
        method: impl Into<String>,
        params: P,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(method, Some(serde_json::to_value(params)?)))
    }

    /// The `params._meta` object, if present
    pub fn meta(&self) -> Option<&serde_json::Map<String, Value>> {
        meta_of(self.params.as_ref())
    }
}

fn meta_of(params: Option<&Value>) -> Option<&serde_json::Map<String, Value>> {
    params
        .and_then(|p| p.get(META_KEY))
        .and_then(Value::as_object)
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new JSON-RPC error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new JSON-RPC error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// JSON-RPC response payload - ensures mutual exclusion of result and error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    /// Successful response with result
    Success {
        /// Response result
        result: Value,
    },
    /// Error response
    Error {
        /// Response error
        error: JsonRpcError,
    },
}

/// Response ID - `None` only for errors raised before an id could be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Option<RequestId>);

/// JSON-RPC response message (a result or an error)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    pub jsonrpc: JsonRpcVersion,
    /// Request identifier
    pub id: ResponseId,
    /// Response payload (either result or error, never both)
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: ResponseId(Some(id)),
            payload: JsonRpcResponsePayload::Success { result },
        }
    }

    /// Create an error response for a request
    pub fn error_response(error: JsonRpcError, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: ResponseId(Some(id)),
            payload: JsonRpcResponsePayload::Error { error },
        }
    }

    /// Create an error response that is not tied to a request (id is null)
    pub fn uncorrelated_error(error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: ResponseId(None),
            payload: JsonRpcResponsePayload::Error { error },
        }
    }

    /// Check if this is a successful response
    pub fn is_success(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Success { .. })
    }

    /// Check if this is an error response
    pub fn is_error(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Error { .. })
    }

    /// Get the result if this is a success response
    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            JsonRpcResponsePayload::Success { result } => Some(result),
            JsonRpcResponsePayload::Error { .. } => None,
        }
    }

    /// Get the error if this is an error response
    pub fn error(&self) -> Option<&JsonRpcError> {
        match &self.payload {
            JsonRpcResponsePayload::Success { .. } => None,
            JsonRpcResponsePayload::Error { error } => Some(error),
        }
    }

    /// Get the request ID this response answers
    pub fn request_id(&self) -> Option<&RequestId> {
        self.id.0.as_ref()
    }
}

/// Any single JSON-RPC envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Request message
    Request(JsonRpcRequest),
    /// Response message (result or error)
    Response(JsonRpcResponse),
    /// Notification message
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// Method name for requests and notifications
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(&r.method),
            Self::Notification(n) => Some(&n.method),
            Self::Response(_) => None,
        }
    }

    /// Check if this is a request
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// Check if this is a response or an error
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    /// Check if this is a notification
    pub fn is_notification(&self) -> bool {
        matches!(self, Self::Notification(_))
    }

    /// Check if this is an `initialize` request
    pub fn is_initialize_request(&self) -> bool {
        matches!(self, Self::Request(r) if r.method == crate::methods::INITIALIZE)
    }

    /// Id of a response or error envelope
    pub fn response_id(&self) -> Option<&RequestId> {
        match self {
            Self::Response(r) => r.request_id(),
            _ => None,
        }
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(request: JsonRpcRequest) -> Self {
        Self::Request(request)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(response: JsonRpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notification: JsonRpcNotification) -> Self {
        Self::Notification(notification)
    }
}

/// A single envelope or an ordered batch of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcBatch {
    /// JSON array of envelopes
    Batch(Vec<JsonRpcMessage>),
    /// Bare envelope
    Single(JsonRpcMessage),
}

impl JsonRpcBatch {
    /// Flatten into messages, preserving order
    pub fn into_messages(self) -> Vec<JsonRpcMessage> {
        match self {
            Self::Batch(messages) => messages,
            Self::Single(message) => vec![message],
        }
    }

    /// Number of envelopes
    pub fn len(&self) -> usize {
        match self {
            Self::Batch(messages) => messages.len(),
            Self::Single(_) => 1,
        }
    }

    /// True for an empty array
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<JsonRpcMessage>> for JsonRpcBatch {
    fn from(messages: Vec<JsonRpcMessage>) -> Self {
        Self::Batch(messages)
    }
}

impl From<JsonRpcMessage> for JsonRpcBatch {
    fn from(message: JsonRpcMessage) -> Self {
        Self::Single(message)
    }
}

/// Utility functions for JSON-RPC message handling
pub mod utils {
    use super::*;

    /// Parse a message or batch from raw bytes
    pub fn parse_batch(bytes: &[u8]) -> Result<JsonRpcBatch, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
