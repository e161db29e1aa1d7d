//! Unified MCP error handling.
//!
//! [`McpError`] is the single error type surfaced by the protocol engine. Every
//! error carries a JSON-RPC `code`, a message and optional structured `data`,
//! so it can always be turned back into a wire error envelope.
//!
//! ```rust
//! use mcpwire_core::error::{ErrorKind, McpError, McpResult};
//!
//! fn lookup() -> McpResult<String> {
//!     Err(McpError::method_not_found("tools/explode"))
//! }
//!
//! let err = lookup().unwrap_err();
//! assert_eq!(err.kind, ErrorKind::MethodNotFound);
//! assert_eq!(err.code, -32601);
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::jsonrpc::JsonRpcError;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// Unified MCP error type
///
/// The `context` field is boxed to keep `Result<T, McpError>` small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpError {
    /// Error classification
    pub kind: ErrorKind,
    /// JSON-RPC error code sent on the wire
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Structured error payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Additional context, never sent on the wire
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Box<ErrorContext>>,
}

/// Additional error context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Operation being performed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Component where error occurred
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Request ID for tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error classification for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // === JSON-RPC Standard Errors ===
    /// Parse error (-32700)
    ParseError,
    /// Invalid request (-32600)
    InvalidRequest,
    /// Method not found (-32601)
    MethodNotFound,
    /// Invalid params (-32602)
    InvalidParams,
    /// Internal error (-32603)
    Internal,

    // === Connection lifecycle ===
    /// The connection went away before a response arrived (-32000)
    ConnectionClosed,
    /// No response within the request timeout (-32001)
    RequestTimeout,
    /// The request was cancelled locally (-32017)
    Cancelled,

    // === MCP / application ===
    /// Capability not supported (-32006)
    CapabilityNotSupported,
    /// Authentication failed (-32008)
    Authentication,
    /// Transport/network error (-32014)
    Transport,
    /// Configuration error (-32015)
    Configuration,
    /// Serialization error (-32602)
    Serialization,
    /// Error returned by the remote peer with a code outside the table above
    Remote,
}

impl ErrorKind {
    /// Default JSON-RPC code for this kind
    #[must_use]
    pub const fn default_code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams | Self::Serialization => -32602,
            Self::Internal | Self::Remote => -32603,
            Self::ConnectionClosed => -32000,
            Self::RequestTimeout => -32001,
            Self::CapabilityNotSupported => -32006,
            Self::Authentication => -32008,
            Self::Transport => -32014,
            Self::Configuration => -32015,
            Self::Cancelled => -32017,
        }
    }

    /// Classify a JSON-RPC error code.
    ///
    /// Codes without a dedicated kind map to [`ErrorKind::Remote`].
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::Internal,
            -32000 => Self::ConnectionClosed,
            -32001 => Self::RequestTimeout,
            -32006 => Self::CapabilityNotSupported,
            -32008 => Self::Authentication,
            -32014 => Self::Transport,
            -32015 => Self::Configuration,
            -32017 => Self::Cancelled,
            _ => Self::Remote,
        }
    }

    /// Get a human-readable description
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid parameters",
            Self::Internal => "Internal error",
            Self::ConnectionClosed => "Connection closed",
            Self::RequestTimeout => "Request timed out",
            Self::Cancelled => "Request cancelled",
            Self::CapabilityNotSupported => "Capability not supported",
            Self::Authentication => "Authentication failed",
            Self::Transport => "Transport error",
            Self::Configuration => "Configuration error",
            Self::Serialization => "Serialization error",
            Self::Remote => "Remote error",
        }
    }
}

impl McpError {
    /// Create a new error with kind and message, using the kind's default code
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.default_code(),
            message: message.into(),
            data: None,
            context: None,
        }
    }

    /// Create a parse error
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message)
    }

    /// Create an invalid request error
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Create a method not found error
    #[must_use]
    pub fn method_not_found(method: impl Into<String>) -> Self {
        let method = method.into();
        Self::new(ErrorKind::MethodNotFound, format!("Method not found: {method}"))
            .with_data(json!({ "method": method }))
    }

    /// Create a validation/invalid params error
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a connection closed error
    #[must_use]
    pub fn connection_closed() -> Self {
        Self::new(ErrorKind::ConnectionClosed, "Connection closed")
    }

    /// Interval timeout. `data` is `{ "timeout": <ms> }`.
    #[must_use]
    pub fn request_timeout(timeout: Duration) -> Self {
        Self::new(ErrorKind::RequestTimeout, "Request timed out")
            .with_data(json!({ "timeout": duration_millis(timeout) }))
    }

    /// Total-time ceiling exceeded. `data` is `{ "maxTotalTimeout", "totalElapsed" }`.
    #[must_use]
    pub fn total_timeout(max_total: Duration, elapsed: Duration) -> Self {
        Self::new(ErrorKind::RequestTimeout, "Maximum total timeout exceeded").with_data(json!({
            "maxTotalTimeout": duration_millis(max_total),
            "totalElapsed": duration_millis(elapsed),
        }))
    }

    /// Create a cancelled error
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, reason)
    }

    /// Create a capability not supported error
    #[must_use]
    pub fn capability_not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CapabilityNotSupported, message)
    }

    /// Create an authentication error
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    /// Rebuild an error received from the remote peer, keeping its exact code
    #[must_use]
    pub fn from_rpc(error: JsonRpcError) -> Self {
        Self {
            kind: ErrorKind::from_code(error.code),
            code: error.code,
            message: error.message,
            data: error.data,
            context: None,
        }
    }

    /// Wire representation of this error
    #[must_use]
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code,
            message: self.message.clone(),
            data: self.data.clone(),
        }
    }

    /// Attach structured data
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Override the wire code, keeping the kind
    #[must_use]
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    /// Set the operation context
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Set the component context
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.context_mut().component = Some(component.into());
        self
    }

    /// Set the request ID context
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context_mut().request_id = Some(request_id.into());
        self
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        self.context.get_or_insert_with(Box::default)
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MCP error {}: {}", self.code, self.message)?;
        if let Some(ctx) = &self.context {
            if let Some(op) = &ctx.operation {
                write!(f, " (operation: {op})")?;
            }
            if let Some(comp) = &ctx.component {
                write!(f, " (component: {comp})")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl std::error::Error for McpError {}

impl From<JsonRpcError> for McpError {
    fn from(error: JsonRpcError) -> Self {
        Self::from_rpc(error)
    }
}

impl From<&McpError> for JsonRpcError {
    fn from(error: &McpError) -> Self {
        error.to_rpc_error()
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        let kind = if err.is_syntax() || err.is_eof() {
            ErrorKind::ParseError
        } else if err.is_data() {
            ErrorKind::InvalidParams
        } else {
            ErrorKind::Serialization
        };
        Self::new(kind, format!("JSON error: {err}"))
    }
}
