//! Transport error types.

use mcpwire_core::{ErrorKind, McpError};
use thiserror::Error;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur during transport operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Failed to send a message.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive a message.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Failed to serialize or deserialize a message.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// A protocol-level error occurred.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Authentication with the remote endpoint failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// `start` was called on a transport that is already running.
    #[error("Transport already started")]
    AlreadyStarted,

    /// The transport has not been started or was closed.
    #[error("Transport not connected")]
    NotConnected,

    /// An underlying I/O error occurred.
    #[error("IO error: {0}")]
    Io(String),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}

impl From<TransportError> for McpError {
    fn from(err: TransportError) -> Self {
        let kind = match &err {
            TransportError::ConnectionLost(_) | TransportError::NotConnected => {
                ErrorKind::ConnectionClosed
            }
            TransportError::SerializationFailed(_) => ErrorKind::Serialization,
            TransportError::ConfigurationError(_) => ErrorKind::Configuration,
            TransportError::AuthenticationFailed(_) => ErrorKind::Authentication,
            TransportError::ProtocolError(_) => ErrorKind::InvalidRequest,
            TransportError::Internal(_) => ErrorKind::Internal,
            TransportError::ConnectionFailed(_)
            | TransportError::SendFailed(_)
            | TransportError::ReceiveFailed(_)
            | TransportError::AlreadyStarted
            | TransportError::Io(_) => ErrorKind::Transport,
        };
        McpError::new(kind, err.to_string()).with_component("transport")
    }
}
