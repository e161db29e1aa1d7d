//! Core transport trait.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mcpwire_core::{JsonRpcMessage, RequestId};

use crate::error::TransportResult;
use crate::events::TransportEvents;

/// Callback invoked with each new resumption token (an SSE event id)
pub type ResumptionTokenCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Per-send routing hints.
#[derive(Clone, Default)]
pub struct TransportSendOptions {
    /// Inbound request this message belongs to; lets multiplexing transports
    /// route it onto that request's response stream.
    pub related_request_id: Option<RequestId>,
    /// Resume a previously interrupted response stream instead of sending.
    pub resumption_token: Option<String>,
    /// Called whenever the transport learns a new resumption token.
    pub on_resumption_token: Option<ResumptionTokenCallback>,
}

impl TransportSendOptions {
    /// Options with nothing set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route the message alongside `id`
    #[must_use]
    pub fn with_related_request_id(mut self, id: RequestId) -> Self {
        self.related_request_id = Some(id);
        self
    }

    /// Resume from `token`
    #[must_use]
    pub fn with_resumption_token(mut self, token: impl Into<String>) -> Self {
        self.resumption_token = Some(token.into());
        self
    }

    /// Observe resumption tokens
    #[must_use]
    pub fn with_on_resumption_token<F>(mut self, callback: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.on_resumption_token = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for TransportSendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSendOptions")
            .field("related_request_id", &self.related_request_id)
            .field("resumption_token", &self.resumption_token)
            .field("on_resumption_token", &self.on_resumption_token.is_some())
            .finish()
    }
}

/// The core trait for all transport implementations.
///
/// A transport moves JSON-RPC envelopes between two peers. Inbound traffic is
/// not pulled: [`start`](Transport::start) hands back the receiving half of an
/// event channel, and the transport pushes messages, errors and the final
/// close onto it. The protocol engine is the single consumer.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Begins processing. Calling this twice is
    /// [`TransportError::AlreadyStarted`](crate::TransportError::AlreadyStarted).
    fn start(&self) -> Pin<Box<dyn Future<Output = TransportResult<TransportEvents>> + Send + '_>>;

    /// Sends a single message over the transport.
    fn send(
        &self,
        message: JsonRpcMessage,
        options: TransportSendOptions,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Closes the connection. A `Closed` event follows on the event channel.
    fn close(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;

    /// Session identifier, for transports that have one.
    fn session_id(&self) -> Option<String> {
        None
    }

    /// Records the negotiated protocol version.
    fn set_protocol_version(&self, version: &str) {
        let _ = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _test_transport_object(_t: &dyn Transport) {}

    #[test]
    fn test_send_options_debug_hides_callback() {
        let options = TransportSendOptions::new()
            .with_related_request_id(RequestId::Number(4))
            .with_on_resumption_token(|_| {});
        let debug = format!("{options:?}");
        assert!(debug.contains("Number(4)"));
        assert!(debug.contains("on_resumption_token: true"));
    }
}
