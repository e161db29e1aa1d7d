//! The correlation engine.
//!
//! A [`Protocol`] owns one connection at a time. Outbound requests register a
//! pending entry with a oneshot responder and a timer task; the dispatcher
//! task is the single consumer of the transport's event channel and routes:
//!
//! - **Responses** to the pending entry with the same id
//! - **Requests** to the handler registered for the method, each in its own task
//! - **Notifications** to the built-in cancel/progress handling or a registered handler
//!
//! State sits behind one `parking_lot::Mutex` that is never held across an
//! `.await`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use mcpwire_core::jsonrpc::{META_KEY, PROGRESS_TOKEN_KEY};
use mcpwire_core::methods::{CANCELLED, PING, PROGRESS};
use mcpwire_core::{
    CancelledNotificationParams, Capabilities, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, JsonRpcResponsePayload, McpError, McpResult, PeerRole,
    ProgressNotificationParams, RequestId,
};
use mcpwire_transport_traits::{
    MessageExtra, Transport, TransportEvent, TransportEvents, TransportSendOptions,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::capability::{
    assert_capability_for_method, assert_notification_capability,
    assert_request_handler_capability,
};
use crate::context::RequestContext;
use crate::handler::{
    CloseCallback, ErrorCallback, NotificationHandler, RequestHandler, boxed_notification_handler,
    boxed_request_handler,
};
use crate::options::{NotificationOptions, ProgressCallback, ProtocolOptions, RequestOptions};

struct PendingRequest {
    responder: oneshot::Sender<McpResult<Value>>,
    on_progress: Option<ProgressCallback>,
    reset_timeout_on_progress: bool,
    max_total_timeout: Option<Duration>,
    started: Instant,
    reset: Arc<Notify>,
    timer: JoinHandle<()>,
    related_request_id: Option<RequestId>,
}

#[derive(Default)]
struct State {
    transport: Option<Arc<dyn Transport>>,
    connected: bool,
    generation: u64,
    pending: HashMap<RequestId, PendingRequest>,
    inbound: HashMap<RequestId, CancellationToken>,
    request_handlers: HashMap<String, RequestHandler>,
    notification_handlers: HashMap<String, NotificationHandler>,
    fallback_request_handler: Option<RequestHandler>,
    fallback_notification_handler: Option<NotificationHandler>,
    debounced: HashSet<String>,
    local_capabilities: Capabilities,
    remote_capabilities: Capabilities,
    on_close: Option<CloseCallback>,
    on_error: Option<ErrorCallback>,
}

struct Inner {
    role: PeerRole,
    options: ProtocolOptions,
    next_id: AtomicI64,
    state: Mutex<State>,
}

/// One side of an MCP conversation.
///
/// Cheap to clone; clones share the same connection and registries.
#[derive(Clone)]
pub struct Protocol {
    inner: Arc<Inner>,
}

/// Removes a pending entry if the request future is dropped before settling.
struct PendingGuard<'a> {
    protocol: &'a Protocol,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let pending = self.protocol.inner.state.lock().pending.remove(&self.id);
        if let Some(pending) = pending {
            pending.timer.abort();
        }
    }
}

fn not_connected() -> McpError {
    McpError::connection_closed().with_component("protocol")
}

impl Protocol {
    /// Create an unconnected engine for `role`
    pub fn new(role: PeerRole, options: ProtocolOptions) -> Self {
        let protocol = Self {
            inner: Arc::new(Inner {
                role,
                options,
                next_id: AtomicI64::new(0),
                state: Mutex::new(State::default()),
            }),
        };
        protocol.inner.state.lock().request_handlers.insert(
            PING.to_string(),
            boxed_request_handler(|_, _| async { Ok(json!({})) }),
        );
        protocol
    }

    /// Role this engine plays
    pub fn role(&self) -> PeerRole {
        self.inner.role
    }

    /// Engine options
    pub fn options(&self) -> &ProtocolOptions {
        &self.inner.options
    }

    /// Whether a transport is attached
    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().connected
    }

    /// The attached transport
    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.inner.state.lock().transport.clone()
    }

    /// Number of outbound requests still awaiting an outcome
    pub fn pending_requests(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Merge `capabilities` into the local set. Only allowed before `connect`.
    pub fn register_capabilities(&self, capabilities: impl Into<Capabilities>) -> McpResult<()> {
        let mut state = self.inner.state.lock();
        if state.connected {
            return Err(McpError::invalid_request(
                "Cannot register capabilities after connecting to transport",
            ));
        }
        state.local_capabilities.merge(capabilities.into());
        Ok(())
    }

    /// Capabilities this peer advertises
    pub fn local_capabilities(&self) -> Capabilities {
        self.inner.state.lock().local_capabilities.clone()
    }

    /// Record what the remote peer advertised during initialization
    pub fn set_remote_capabilities(&self, capabilities: impl Into<Capabilities>) {
        self.inner.state.lock().remote_capabilities = capabilities.into();
    }

    /// Capabilities the remote peer advertised
    pub fn remote_capabilities(&self) -> Capabilities {
        self.inner.state.lock().remote_capabilities.clone()
    }

    /// Called once each time a connection is lost
    pub fn on_close<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.state.lock().on_close = Some(Arc::new(callback));
    }

    /// Receives errors that have no caller: unknown response ids, malformed
    /// notifications, failed handler replies, transport error events.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(McpError) + Send + Sync + 'static,
    {
        self.inner.state.lock().on_error = Some(Arc::new(callback));
    }

    /// Attach a transport and start dispatching its events.
    pub async fn connect(&self, transport: Arc<dyn Transport>) -> McpResult<()> {
        if self.is_connected() {
            return Err(McpError::invalid_request(
                "Protocol is already connected to a transport",
            ));
        }
        let events = transport.start().await?;
        let generation = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.transport = Some(transport);
            state.connected = true;
            state.generation
        };
        debug!(role = %self.inner.role, "protocol connected");

        let this = self.clone();
        tokio::spawn(async move { this.run_dispatcher(events, generation).await });
        Ok(())
    }

    /// Close the transport. Connection-loss handling follows once the
    /// transport reports the close.
    pub async fn close(&self) -> McpResult<()> {
        let Some(transport) = self.transport() else {
            return Ok(());
        };
        transport.close().await?;
        Ok(())
    }

    async fn run_dispatcher(self, mut events: TransportEvents, generation: u64) {
        trace!(role = %self.inner.role, "dispatcher started");
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message { message, extra } => self.dispatch(message, extra),
                TransportEvent::Error(err) => self.report_error(err.into()),
                TransportEvent::Closed => break,
            }
        }
        self.handle_connection_closed(generation);
    }

    fn dispatch(&self, message: JsonRpcMessage, extra: MessageExtra) {
        match message {
            JsonRpcMessage::Response(response) => self.handle_response(response),
            JsonRpcMessage::Request(request) => self.handle_request(request, extra),
            JsonRpcMessage::Notification(notification) => self.handle_notification(notification),
        }
    }

    fn handle_response(&self, response: JsonRpcResponse) {
        let Some(id) = response.request_id().cloned() else {
            let error = match response.payload {
                JsonRpcResponsePayload::Error { error } => McpError::from_rpc(error),
                JsonRpcResponsePayload::Success { .. } => {
                    McpError::invalid_request("Received a response without an id")
                }
            };
            self.report_error(error);
            return;
        };

        let pending = self.inner.state.lock().pending.remove(&id);
        let Some(pending) = pending else {
            self.report_error(
                McpError::invalid_request(format!(
                    "Received a response for an unknown message ID: {id}"
                ))
                .with_request_id(id.to_string()),
            );
            return;
        };

        pending.timer.abort();
        let outcome = match response.payload {
            JsonRpcResponsePayload::Success { result } => Ok(result),
            JsonRpcResponsePayload::Error { error } => Err(McpError::from_rpc(error)),
        };
        trace!(request_id = %id, ok = outcome.is_ok(), "response routed");
        let _ = pending.responder.send(outcome);
    }

    fn handle_request(&self, request: JsonRpcRequest, extra: MessageExtra) {
        let (handler, transport) = {
            let state = self.inner.state.lock();
            let handler = state
                .request_handlers
                .get(&request.method)
                .cloned()
                .or_else(|| state.fallback_request_handler.clone());
            (handler, state.transport.clone())
        };
        let Some(transport) = transport else {
            return;
        };
        let id = request.id.clone();

        let Some(handler) = handler else {
            debug!(method = %request.method, request_id = %id, "no handler for request");
            let error = McpError::method_not_found(&request.method).to_rpc_error();
            let response = JsonRpcResponse::error_response(error, id.clone());
            let this = self.clone();
            tokio::spawn(async move { this.send_response(transport, response, id).await });
            return;
        };

        let token = CancellationToken::new();
        self.inner
            .state
            .lock()
            .inbound
            .insert(id.clone(), token.clone());
        let ctx = RequestContext::new(
            id.clone(),
            token.clone(),
            extra.session_id,
            extra.auth_token,
            request.meta().cloned(),
            self.clone(),
        );

        let this = self.clone();
        tokio::spawn(async move {
            let result = handler(request, ctx).await;
            this.inner.state.lock().inbound.remove(&id);
            if token.is_cancelled() {
                debug!(request_id = %id, "request cancelled, reply suppressed");
                return;
            }
            let response = match result {
                Ok(result) => JsonRpcResponse::success(result, id.clone()),
                Err(err) => JsonRpcResponse::error_response(err.to_rpc_error(), id.clone()),
            };
            this.send_response(transport, response, id).await;
        });
    }

    async fn send_response(
        &self,
        transport: Arc<dyn Transport>,
        response: JsonRpcResponse,
        id: RequestId,
    ) {
        let options = TransportSendOptions::new().with_related_request_id(id.clone());
        if let Err(err) = transport.send(response.into(), options).await {
            self.report_error(
                McpError::from(err)
                    .with_operation("send_response")
                    .with_request_id(id.to_string()),
            );
        }
    }

    fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            CANCELLED => return self.handle_cancelled(&notification),
            PROGRESS => return self.handle_progress(&notification),
            _ => {}
        }

        let handler = {
            let state = self.inner.state.lock();
            state
                .notification_handlers
                .get(&notification.method)
                .cloned()
                .or_else(|| state.fallback_notification_handler.clone())
        };
        let Some(handler) = handler else {
            trace!(method = %notification.method, "notification dropped, no handler");
            return;
        };

        let this = self.clone();
        tokio::spawn(async move {
            let method = notification.method.clone();
            if let Err(err) = handler(notification).await {
                this.report_error(err.with_operation(format!("notification {method}")));
            }
        });
    }

    fn handle_cancelled(&self, notification: &JsonRpcNotification) {
        let params: CancelledNotificationParams = match parse_params(notification) {
            Ok(params) => params,
            Err(err) => return self.report_error(err),
        };
        let token = self.inner.state.lock().inbound.get(&params.request_id).cloned();
        match token {
            Some(token) => {
                debug!(
                    request_id = %params.request_id,
                    reason = params.reason.as_deref().unwrap_or(""),
                    "peer cancelled request"
                );
                token.cancel();
            }
            None => trace!(request_id = %params.request_id, "cancel for unknown request"),
        }
    }

    fn handle_progress(&self, notification: &JsonRpcNotification) {
        let params: ProgressNotificationParams = match parse_params(notification) {
            Ok(params) => params,
            Err(err) => return self.report_error(err),
        };
        let Some(number) = params.progress_token.as_number() else {
            return self.report_error(McpError::invalid_params(format!(
                "Received a progress notification with a non-numeric token: {}",
                params.progress_token
            )));
        };
        let id = RequestId::Number(number);

        let mut state = self.inner.state.lock();
        let Some(pending) = state.pending.get(&id) else {
            drop(state);
            return self.report_error(McpError::invalid_params(format!(
                "Received a progress notification for an unknown token: {id}"
            )));
        };

        let elapsed = pending.started.elapsed();
        let exceeded = if pending.reset_timeout_on_progress {
            pending.max_total_timeout.filter(|max| elapsed >= *max)
        } else {
            None
        };
        if let Some(max) = exceeded {
            let pending = state.pending.remove(&id);
            drop(state);
            if let Some(pending) = pending {
                pending.timer.abort();
                let err = McpError::total_timeout(max, elapsed);
                self.send_cancel_notification(
                    id,
                    err.message.clone(),
                    pending.related_request_id.clone(),
                );
                let _ = pending.responder.send(Err(err));
            }
            return;
        }

        if pending.reset_timeout_on_progress {
            pending.reset.notify_one();
        }
        let on_progress = pending.on_progress.clone();
        drop(state);

        if let Some(on_progress) = on_progress {
            on_progress(params.progress);
        }
    }

    fn handle_connection_closed(&self, generation: u64) {
        let (pending, inbound, on_close) = {
            let mut state = self.inner.state.lock();
            if !state.connected || state.generation != generation {
                return;
            }
            state.connected = false;
            state.transport = None;
            state.debounced.clear();
            (
                std::mem::take(&mut state.pending),
                std::mem::take(&mut state.inbound),
                state.on_close.clone(),
            )
        };
        debug!(
            role = %self.inner.role,
            pending = pending.len(),
            inbound = inbound.len(),
            "connection closed"
        );

        for token in inbound.into_values() {
            token.cancel();
        }
        for pending in pending.into_values() {
            pending.timer.abort();
            let _ = pending.responder.send(Err(McpError::connection_closed()));
        }
        if let Some(on_close) = on_close {
            on_close();
        }
    }

    fn report_error(&self, error: McpError) {
        warn!(code = error.code, "{}", error.message);
        let on_error = self.inner.state.lock().on_error.clone();
        if let Some(on_error) = on_error {
            on_error(error);
        }
    }

    /// Send a request and wait for its outcome.
    ///
    /// Exactly one of these settles the call: the response, an error
    /// response, a timeout, local cancellation, or connection loss.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> McpResult<Value> {
        let transport = self.transport().ok_or_else(not_connected)?;
        if self.inner.options.enforce_strict_capabilities {
            let state = self.inner.state.lock();
            assert_capability_for_method(self.inner.role, method, &state.remote_capabilities)?;
        }
        let cancel_reason = options
            .cancel_reason
            .clone()
            .unwrap_or_else(|| "Request cancelled".to_string());
        if options
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(McpError::cancelled(cancel_reason));
        }

        let id = RequestId::Number(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let params = if options.on_progress.is_some() {
            embed_progress_token(params, &id)
        } else {
            params
        };
        let request = JsonRpcRequest::new(method, params, id.clone());
        let timeout = options
            .timeout
            .unwrap_or(self.inner.options.default_request_timeout);

        let (responder, outcome) = oneshot::channel();
        {
            let mut state = self.inner.state.lock();
            let started = Instant::now();
            let reset = Arc::new(Notify::new());
            let timer = self.spawn_timer(
                id.clone(),
                timeout,
                options.max_total_timeout,
                started,
                Arc::clone(&reset),
            );
            state.pending.insert(
                id.clone(),
                PendingRequest {
                    responder,
                    on_progress: options.on_progress.clone(),
                    reset_timeout_on_progress: options.reset_timeout_on_progress,
                    max_total_timeout: options.max_total_timeout,
                    started,
                    reset,
                    timer,
                    related_request_id: options.related_request_id.clone(),
                },
            );
        }
        let _guard = PendingGuard {
            protocol: self,
            id: id.clone(),
        };

        trace!(request_id = %id, method, "sending request");
        let send_options = TransportSendOptions {
            related_request_id: options.related_request_id.clone(),
            resumption_token: options.resumption_token.clone(),
            on_resumption_token: options.on_resumption_token.clone(),
        };
        // A transport may hold `send` open until the reply is in (JSON
        // response bodies), so the send races the outcome and cancellation.
        let send = transport.send(request.into(), send_options);
        let cancelled = async {
            match &options.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(send, cancelled);
        let mut outcome = outcome;
        let mut sent = false;
        loop {
            tokio::select! {
                result = &mut send, if !sent => {
                    sent = true;
                    result.map_err(|err| McpError::from(err).with_request_id(id.to_string()))?;
                }
                outcome = &mut outcome => {
                    return outcome.unwrap_or_else(|_| Err(McpError::connection_closed()));
                }
                () = &mut cancelled => {
                    self.cancel_pending(&id, cancel_reason.clone());
                    return Err(McpError::cancelled(cancel_reason).with_request_id(id.to_string()));
                }
            }
        }
    }

    /// [`request`](Self::request), decoding the result into `R`.
    ///
    /// A decode failure is an `InvalidParams` error even though the call
    /// itself succeeded on the wire.
    pub async fn request_typed<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        options: RequestOptions,
    ) -> McpResult<R> {
        let value = self.request(method, params, options).await?;
        serde_json::from_value(value)
            .map_err(|e| McpError::invalid_params(format!("Invalid result for {method}: {e}")))
    }

    /// Emit a notification.
    pub async fn notification(
        &self,
        method: &str,
        params: Option<Value>,
        options: NotificationOptions,
    ) -> McpResult<()> {
        let transport = self.transport().ok_or_else(not_connected)?;
        {
            let state = self.inner.state.lock();
            assert_notification_capability(self.inner.role, method, &state.local_capabilities)?;
        }

        let debounce = params.is_none()
            && options.related_request_id.is_none()
            && self
                .inner
                .options
                .debounced_notification_methods
                .iter()
                .any(|m| m == method);
        if debounce {
            if !self.inner.state.lock().debounced.insert(method.to_string()) {
                trace!(method, "notification coalesced");
                return Ok(());
            }
            let this = self.clone();
            let method = method.to_string();
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                if !this.inner.state.lock().debounced.remove(&method) {
                    return;
                }
                let Some(transport) = this.transport() else {
                    return;
                };
                let notification = JsonRpcNotification::new(method, None);
                if let Err(err) = transport
                    .send(notification.into(), TransportSendOptions::new())
                    .await
                {
                    this.report_error(err.into());
                }
            });
            return Ok(());
        }

        let send_options = TransportSendOptions {
            related_request_id: options.related_request_id,
            ..TransportSendOptions::default()
        };
        transport
            .send(JsonRpcNotification::new(method, params).into(), send_options)
            .await?;
        Ok(())
    }

    /// Register the handler for an inbound request method.
    ///
    /// Fails when this peer did not declare the capability serving `method`
    /// implies. An existing handler is replaced.
    pub fn set_request_handler<F, Fut>(
        &self,
        method: impl Into<String>,
        handler: F,
    ) -> McpResult<()>
    where
        F: Fn(JsonRpcRequest, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<Value>> + Send + 'static,
    {
        let method = method.into();
        let mut state = self.inner.state.lock();
        assert_request_handler_capability(self.inner.role, &method, &state.local_capabilities)?;
        state
            .request_handlers
            .insert(method, boxed_request_handler(handler));
        Ok(())
    }

    /// Remove a request handler. Returns whether one was registered.
    pub fn remove_request_handler(&self, method: &str) -> bool {
        self.inner
            .state
            .lock()
            .request_handlers
            .remove(method)
            .is_some()
    }

    /// Error if a handler for `method` already exists.
    pub fn assert_can_set_request_handler(&self, method: &str) -> McpResult<()> {
        if self.inner.state.lock().request_handlers.contains_key(method) {
            return Err(McpError::invalid_request(format!(
                "A request handler for {method} already exists, which would be overridden"
            )));
        }
        Ok(())
    }

    /// Register the handler for an inbound notification method
    pub fn set_notification_handler<F, Fut>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(JsonRpcNotification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<()>> + Send + 'static,
    {
        self.inner
            .state
            .lock()
            .notification_handlers
            .insert(method.into(), boxed_notification_handler(handler));
    }

    /// Remove a notification handler. Returns whether one was registered.
    pub fn remove_notification_handler(&self, method: &str) -> bool {
        self.inner
            .state
            .lock()
            .notification_handlers
            .remove(method)
            .is_some()
    }

    /// Handler for request methods without a dedicated one
    pub fn set_fallback_request_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(JsonRpcRequest, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<Value>> + Send + 'static,
    {
        self.inner.state.lock().fallback_request_handler = Some(boxed_request_handler(handler));
    }

    /// Handler for notification methods without a dedicated one
    pub fn set_fallback_notification_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(JsonRpcNotification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<()>> + Send + 'static,
    {
        self.inner.state.lock().fallback_notification_handler =
            Some(boxed_notification_handler(handler));
    }

    fn spawn_timer(
        &self,
        id: RequestId,
        timeout: Duration,
        max_total: Option<Duration>,
        started: Instant,
        reset: Arc<Notify>,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let total_deadline = async move {
                match max_total {
                    Some(max) => {
                        tokio::time::sleep_until(started + max).await;
                        max
                    }
                    None => std::future::pending().await,
                }
            };
            tokio::pin!(total_deadline);

            loop {
                tokio::select! {
                    biased;
                    () = tokio::time::sleep(timeout) => {
                        this.expire(&id, McpError::request_timeout(timeout));
                        return;
                    }
                    max = &mut total_deadline => {
                        this.expire(&id, McpError::total_timeout(max, started.elapsed()));
                        return;
                    }
                    () = reset.notified() => {
                        trace!(request_id = %id, "timeout restarted by progress");
                    }
                }
            }
        })
    }

    fn expire(&self, id: &RequestId, error: McpError) {
        let pending = self.inner.state.lock().pending.remove(id);
        if let Some(pending) = pending {
            debug!(request_id = %id, "request timed out");
            self.send_cancel_notification(
                id.clone(),
                error.message.clone(),
                pending.related_request_id.clone(),
            );
            let _ = pending.responder.send(Err(error));
        }
    }

    fn cancel_pending(&self, id: &RequestId, reason: String) {
        let pending = self.inner.state.lock().pending.remove(id);
        if let Some(pending) = pending {
            pending.timer.abort();
            debug!(request_id = %id, "request cancelled locally");
            self.send_cancel_notification(id.clone(), reason, pending.related_request_id);
        }
    }

    fn send_cancel_notification(
        &self,
        id: RequestId,
        reason: String,
        related_request_id: Option<RequestId>,
    ) {
        let Some(transport) = self.transport() else {
            return;
        };
        let params = CancelledNotificationParams {
            request_id: id,
            reason: Some(reason),
        };
        let notification = match JsonRpcNotification::with_params(CANCELLED, params) {
            Ok(notification) => notification,
            Err(err) => return self.report_error(err.into()),
        };
        let options = TransportSendOptions {
            related_request_id,
            ..TransportSendOptions::default()
        };
        tokio::spawn(async move {
            if let Err(err) = transport.send(notification.into(), options).await {
                debug!(error = %err, "cancellation notification not delivered");
            }
        });
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Protocol")
            .field("role", &self.inner.role)
            .field("options", &self.inner.options)
            .field("connected", &state.connected)
            .field("pending", &state.pending.len())
            .field("inbound", &state.inbound.len())
            .finish_non_exhaustive()
    }
}

fn parse_params<T: DeserializeOwned>(notification: &JsonRpcNotification) -> McpResult<T> {
    let params = notification.params.clone().unwrap_or(Value::Null);
    serde_json::from_value(params).map_err(|e| {
        McpError::invalid_params(format!("Invalid {} params: {e}", notification.method))
    })
}

/// Put `params._meta.progressToken = id`, creating `params` if absent.
fn embed_progress_token(params: Option<Value>, id: &RequestId) -> Option<Value> {
    let mut map = match params {
        None => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => return Some(other),
    };
    let token = match id {
        RequestId::Number(n) => Value::from(*n),
        RequestId::String(s) => Value::from(s.as_str()),
    };
    let meta = map
        .entry(META_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(meta) = meta {
        meta.insert(PROGRESS_TOKEN_KEY.to_string(), token);
    }
    Some(Value::Object(map))
}
