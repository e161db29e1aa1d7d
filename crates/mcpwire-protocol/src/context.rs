//! Per-request context handed to request handlers.

use std::fmt;

use mcpwire_core::jsonrpc::PROGRESS_TOKEN_KEY;
use mcpwire_core::{McpResult, RequestId};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::options::{NotificationOptions, RequestOptions};
use crate::protocol::Protocol;

/// Everything a handler knows about the inbound request it is serving.
///
/// The context lives until the handler settles. Messages sent through it are
/// routed alongside the request, so multiplexing transports deliver them on
/// the same response stream.
#[derive(Clone)]
pub struct RequestContext {
    /// Id of the inbound request
    pub request_id: RequestId,
    /// Fires when the remote peer cancels the request or the connection closes
    pub cancellation: CancellationToken,
    /// Session the request arrived on
    pub session_id: Option<String>,
    /// Bearer token presented with the request
    pub auth_token: Option<String>,
    /// The request's `params._meta`
    pub meta: Option<Map<String, Value>>,
    protocol: Protocol,
}

impl RequestContext {
    pub(crate) fn new(
        request_id: RequestId,
        cancellation: CancellationToken,
        session_id: Option<String>,
        auth_token: Option<String>,
        meta: Option<Map<String, Value>>,
        protocol: Protocol,
    ) -> Self {
        Self {
            request_id,
            cancellation,
            session_id,
            auth_token,
            meta,
            protocol,
        }
    }

    /// Whether the request was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Progress token the requester asked to be notified under
    pub fn progress_token(&self) -> Option<&Value> {
        self.meta.as_ref().and_then(|m| m.get(PROGRESS_TOKEN_KEY))
    }

    /// Send a notification related to this request
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        self.protocol
            .notification(
                method,
                params,
                NotificationOptions::related_to(self.request_id.clone()),
            )
            .await
    }

    /// Issue a request to the remote peer on behalf of this request
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> McpResult<Value> {
        self.protocol
            .request(
                method,
                params,
                options.with_related_request_id(self.request_id.clone()),
            )
            .await
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request_id)
            .field("cancelled", &self.is_cancelled())
            .field("session_id", &self.session_id)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}
