//! Handler and callback types.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use mcpwire_core::{JsonRpcNotification, JsonRpcRequest, McpError, McpResult};
use serde_json::Value;

use crate::context::RequestContext;

/// Serves one inbound request method
pub type RequestHandler = Arc<
    dyn Fn(JsonRpcRequest, RequestContext) -> BoxFuture<'static, McpResult<Value>> + Send + Sync,
>;

/// Consumes one inbound notification method
pub type NotificationHandler =
    Arc<dyn Fn(JsonRpcNotification) -> BoxFuture<'static, McpResult<()>> + Send + Sync>;

/// Fired once when the connection is lost
pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;

/// Receives errors that have no caller to return to
pub type ErrorCallback = Arc<dyn Fn(McpError) + Send + Sync>;

pub(crate) fn boxed_request_handler<F, Fut>(handler: F) -> RequestHandler
where
    F: Fn(JsonRpcRequest, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = McpResult<Value>> + Send + 'static,
{
    Arc::new(move |request, ctx| Box::pin(handler(request, ctx)))
}

pub(crate) fn boxed_notification_handler<F, Fut>(handler: F) -> NotificationHandler
where
    F: Fn(JsonRpcNotification) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = McpResult<()>> + Send + 'static,
{
    Arc::new(move |notification| Box::pin(handler(notification)))
}
