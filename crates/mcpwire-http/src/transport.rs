//! Streamable HTTP client transport.
//!
//! Every outbound message is a POST to the endpoint. The server answers with
//! 202 (nothing to deliver), a JSON body, or an SSE stream that is read in a
//! background task. After `notifications/initialized` is accepted a GET opens
//! the standalone stream for server pushes. Dropped streams are re-opened with
//! `Last-Event-ID` and exponential backoff.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;
use mcpwire_core::methods::INITIALIZED;
use mcpwire_core::{JsonRpcBatch, JsonRpcMessage, RequestId, ResponseId};
use mcpwire_streamable::SseParser;
use mcpwire_streamable::headers::{
    ACCEPT_POST, CONTENT_TYPE_JSON, CONTENT_TYPE_SSE, lists_media_type,
};
use mcpwire_transport_traits::{
    MessageExtra, ResumptionTokenCallback, Transport, TransportError, TransportEventEmitter,
    TransportEvents, TransportResult, TransportSendOptions,
};
use parking_lot::Mutex;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::auth::{CredentialScope, UnauthorizedContext};
use crate::config::StreamableHttpClientConfig;

const MCP_SESSION_ID: HeaderName = HeaderName::from_static("mcp-session-id");
const MCP_PROTOCOL_VERSION: HeaderName = HeaderName::from_static("mcp-protocol-version");
const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

#[derive(Default)]
struct ClientState {
    session_id: Option<String>,
    protocol_version: Option<String>,
    /// Set while a 401 retry is in flight
    auth_retried: bool,
    tasks: Vec<JoinHandle<()>>,
}

/// Progress of one SSE stream across reconnections
struct StreamCursor {
    standalone: bool,
    last_event_id: Option<String>,
    retry_hint: Option<Duration>,
    received: usize,
    on_resumption_token: Option<ResumptionTokenCallback>,
    /// Responses replayed on a resumed stream are re-addressed to this id
    replay_message_id: Option<RequestId>,
}

impl StreamCursor {
    fn standalone() -> Self {
        Self {
            standalone: true,
            ..Self::response(None, None, None)
        }
    }

    fn response(
        last_event_id: Option<String>,
        on_resumption_token: Option<ResumptionTokenCallback>,
        replay_message_id: Option<RequestId>,
    ) -> Self {
        Self {
            standalone: false,
            last_event_id,
            retry_hint: None,
            received: 0,
            on_resumption_token,
            replay_message_id,
        }
    }

    fn readdress(&self, mut message: JsonRpcMessage) -> JsonRpcMessage {
        if let (Some(id), JsonRpcMessage::Response(response)) =
            (&self.replay_message_id, &mut message)
        {
            response.id = ResponseId(Some(id.clone()));
        }
        message
    }
}

struct Inner {
    config: StreamableHttpClientConfig,
    http: Client,
    emitter: TransportEventEmitter,
    events: Mutex<Option<TransportEvents>>,
    state: Mutex<ClientState>,
    closed: AtomicBool,
}

/// Client side of the streamable HTTP transport.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use mcpwire_core::PeerRole;
/// use mcpwire_http::{StreamableHttpClientConfig, StreamableHttpClientTransport};
/// use mcpwire_protocol::{Protocol, ProtocolOptions, RequestOptions};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = StreamableHttpClientConfig::parse("http://127.0.0.1:8080/mcp")?;
/// let transport = StreamableHttpClientTransport::new(config)?;
///
/// let client = Protocol::new(PeerRole::Client, ProtocolOptions::default());
/// client.connect(Arc::new(transport.clone())).await?;
/// client.request("ping", None, RequestOptions::default()).await?;
///
/// transport.terminate_session().await?;
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StreamableHttpClientTransport {
    inner: Arc<Inner>,
}

impl StreamableHttpClientTransport {
    /// Create a transport. No request is made until the first send.
    pub fn new(config: StreamableHttpClientConfig) -> TransportResult<Self> {
        let mut builder = Client::builder().connect_timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let http = builder.build().map_err(|e| {
            TransportError::ConfigurationError(format!("Failed to build HTTP client: {e}"))
        })?;

        let (emitter, events) = TransportEventEmitter::new();
        let state = ClientState {
            session_id: config.session_id.clone(),
            ..ClientState::default()
        };
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http,
                emitter,
                events: Mutex::new(Some(events)),
                state: Mutex::new(state),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Transport configuration
    pub fn config(&self) -> &StreamableHttpClientConfig {
        &self.inner.config
    }

    /// Version sent in `Mcp-Protocol-Version`
    pub fn protocol_version(&self) -> Option<String> {
        self.inner.state.lock().protocol_version.clone()
    }

    /// Whether [`close`](Transport::close) was called
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// End the session on the server with DELETE.
    ///
    /// Servers that do not support termination answer 405, which is not an
    /// error. The session id is forgotten either way.
    pub async fn terminate_session(&self) -> TransportResult<()> {
        let inner = &self.inner;
        if inner.state.lock().session_id.is_none() {
            return Ok(());
        }

        let headers = inner.common_headers().await;
        let response = inner
            .http
            .delete(inner.config.url.clone())
            .headers(headers)
            .timeout(inner.config.timeout)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to terminate session: {e}")))?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::METHOD_NOT_ALLOWED {
            return Err(inner.report(TransportError::SendFailed(format!(
                "Failed to terminate session: HTTP {}",
                status.as_u16()
            ))));
        }
        let previous = inner.state.lock().session_id.take();
        info!(session_id = ?previous, "session terminated");
        Ok(())
    }

    /// Complete an interactive authorization with `code`
    pub async fn finish_auth(&self, code: &str) -> TransportResult<()> {
        let authenticator = self.inner.config.authenticator.as_ref().ok_or_else(|| {
            TransportError::AuthenticationFailed("No authenticator configured".to_string())
        })?;
        authenticator
            .finish_authorization(code)
            .await
            .map_err(|e| TransportError::AuthenticationFailed(e.to_string()))
    }
}

impl fmt::Debug for StreamableHttpClientTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("StreamableHttpClientTransport")
            .field("url", &self.inner.config.url.as_str())
            .field("session_id", &state.session_id)
            .field("protocol_version", &state.protocol_version)
            .field("closed", &self.inner.is_closed())
            .finish_non_exhaustive()
    }
}

impl Transport for StreamableHttpClientTransport {
    fn start(&self) -> Pin<Box<dyn Future<Output = TransportResult<TransportEvents>> + Send + '_>> {
        Box::pin(async move {
            self.inner
                .events
                .lock()
                .take()
                .ok_or(TransportError::AlreadyStarted)
        })
    }

    fn send(
        &self,
        message: JsonRpcMessage,
        options: TransportSendOptions,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(Arc::clone(&self.inner).send(message, options))
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.inner.shutdown();
            Ok(())
        })
    }

    fn session_id(&self) -> Option<String> {
        self.inner.state.lock().session_id.clone()
    }

    fn set_protocol_version(&self, version: &str) {
        self.inner.state.lock().protocol_version = Some(version.to_string());
    }
}

impl Inner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn send(
        self: Arc<Self>,
        message: JsonRpcMessage,
        options: TransportSendOptions,
    ) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::NotConnected);
        }

        if let Some(token) = options.resumption_token {
            let replay_message_id = match &message {
                JsonRpcMessage::Request(request) => Some(request.id.clone()),
                _ => None,
            };
            debug!(last_event_id = %token, "resuming response stream");
            let cursor =
                StreamCursor::response(Some(token), options.on_resumption_token, replay_message_id);
            self.spawn_stream(None, cursor);
            return Ok(());
        }

        let body = serde_json::to_vec(&message)?;
        loop {
            let mut headers = self.common_headers().await;
            headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT_POST));
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));

            trace!(method = message.method().unwrap_or_default(), "POST");
            let response = self
                .http
                .post(self.config.url.clone())
                .headers(headers)
                .body(body.clone())
                .send()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            self.capture_session(&response);

            let status = response.status();
            if status == StatusCode::UNAUTHORIZED {
                let challenge = challenge_of(&response);
                self.authorize(challenge).await?;
                continue;
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(self.report(TransportError::SendFailed(format!(
                    "Error POSTing to endpoint (HTTP {}): {text}",
                    status.as_u16()
                ))));
            }
            self.state.lock().auth_retried = false;

            if status == StatusCode::ACCEPTED {
                if message.method() == Some(INITIALIZED) {
                    self.spawn_stream(None, StreamCursor::standalone());
                }
                return Ok(());
            }

            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if lists_media_type(&content_type, CONTENT_TYPE_SSE) {
                let cursor = StreamCursor::response(None, options.on_resumption_token, None);
                self.spawn_stream(Some(response), cursor);
                return Ok(());
            }
            if lists_media_type(&content_type, CONTENT_TYPE_JSON) {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
                if bytes.is_empty() {
                    return Ok(());
                }
                let batch: JsonRpcBatch = serde_json::from_slice(&bytes)?;
                for reply in batch.into_messages() {
                    self.deliver(reply);
                }
                return Ok(());
            }
            if message.is_request() {
                return Err(TransportError::ProtocolError(format!(
                    "Unexpected content type: {content_type}"
                )));
            }
            return Ok(());
        }
    }

    async fn common_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.config.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }

        if let Some(authenticator) = &self.config.authenticator
            && let Some(token) = authenticator.tokens().await
            && let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}"))
        {
            headers.insert(header::AUTHORIZATION, value);
        }

        let (session_id, protocol_version) = {
            let state = self.state.lock();
            (state.session_id.clone(), state.protocol_version.clone())
        };
        if let Some(id) = session_id
            && let Ok(value) = HeaderValue::from_str(&id)
        {
            headers.insert(MCP_SESSION_ID, value);
        }
        if let Some(version) = protocol_version
            && let Ok(value) = HeaderValue::from_str(&version)
        {
            headers.insert(MCP_PROTOCOL_VERSION, value);
        }
        headers
    }

    fn capture_session(&self, response: &Response) {
        if let Some(id) = response
            .headers()
            .get(&MCP_SESSION_ID)
            .and_then(|v| v.to_str().ok())
        {
            let mut state = self.state.lock();
            if state.session_id.as_deref() != Some(id) {
                debug!(session_id = %id, "session id received");
                state.session_id = Some(id.to_string());
            }
        }
    }

    /// Run one step of the auth cycle. `Ok` means the request should be retried.
    async fn authorize(&self, challenge: Option<String>) -> TransportResult<()> {
        let Some(authenticator) = &self.config.authenticator else {
            return Err(TransportError::AuthenticationFailed(
                "Server returned 401 and no authenticator is configured".to_string(),
            ));
        };

        let already_retried = std::mem::replace(&mut self.state.lock().auth_retried, true);
        if already_retried {
            self.state.lock().auth_retried = false;
            authenticator.invalidate_credentials(CredentialScope::Tokens);
            return Err(TransportError::AuthenticationFailed(
                "Server returned 401 after re-authorization".to_string(),
            ));
        }

        let context =
            UnauthorizedContext::from_challenge(self.config.url.clone(), challenge.as_deref());
        info!(
            resource_metadata = ?context.resource_metadata_url.as_ref().map(|u| u.as_str()),
            "authorization required"
        );
        if let Err(e) = authenticator.authorize(context).await {
            self.state.lock().auth_retried = false;
            return Err(TransportError::AuthenticationFailed(e.to_string()));
        }
        Ok(())
    }

    fn spawn_stream(self: &Arc<Self>, first: Option<Response>, cursor: StreamCursor) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(inner.run_stream(first, cursor));
        let mut state = self.state.lock();
        state.tasks.retain(|task| !task.is_finished());
        state.tasks.push(handle);
        if self.is_closed() {
            for task in state.tasks.drain(..) {
                task.abort();
            }
        }
    }

    async fn run_stream(self: Arc<Self>, first: Option<Response>, mut cursor: StreamCursor) {
        let mut attempt = 0u32;
        let mut pending = first;
        loop {
            let response = match pending.take() {
                Some(response) => response,
                None => match self.open_get(cursor.last_event_id.as_deref()).await {
                    Ok(Some(response)) => response,
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = %e, "failed to open SSE stream");
                        let fatal = matches!(e, TransportError::AuthenticationFailed(_));
                        self.emitter.emit_error(e);
                        if fatal || !self.backoff(&mut attempt, &cursor).await {
                            return;
                        }
                        continue;
                    }
                },
            };

            let received = cursor.received;
            let result = self.read_stream(response, &mut cursor).await;
            if self.is_closed() {
                return;
            }
            if cursor.received > received {
                attempt = 0;
            }
            match result {
                Ok(()) if !cursor.standalone => {
                    trace!("response stream finished");
                    return;
                }
                Ok(()) => debug!("standalone stream ended"),
                Err(e) => {
                    warn!(
                        error = %e,
                        last_event_id = ?cursor.last_event_id,
                        "SSE stream interrupted"
                    );
                    self.emitter.emit_error(e);
                    if !cursor.standalone && cursor.last_event_id.is_none() {
                        return;
                    }
                }
            }
            if !self.backoff(&mut attempt, &cursor).await {
                return;
            }
        }
    }

    /// GET the endpoint as an SSE stream. `None` means the server offers none.
    async fn open_get(&self, last_event_id: Option<&str>) -> TransportResult<Option<Response>> {
        loop {
            let mut headers = self.common_headers().await;
            headers.insert(header::ACCEPT, HeaderValue::from_static(CONTENT_TYPE_SSE));
            if let Some(id) = last_event_id
                && let Ok(value) = HeaderValue::from_str(id)
            {
                headers.insert(LAST_EVENT_ID, value);
            }

            let response = self
                .http
                .get(self.config.url.clone())
                .headers(headers)
                .send()
                .await
                .map_err(|e| {
                    TransportError::ConnectionFailed(format!("Failed to open SSE stream: {e}"))
                })?;
            self.capture_session(&response);

            match response.status() {
                StatusCode::UNAUTHORIZED => {
                    let challenge = challenge_of(&response);
                    self.authorize(challenge).await?;
                }
                StatusCode::METHOD_NOT_ALLOWED => {
                    debug!("server offers no SSE stream at GET");
                    return Ok(None);
                }
                status if !status.is_success() => {
                    return Err(TransportError::ConnectionFailed(format!(
                        "Failed to open SSE stream: HTTP {}",
                        status.as_u16()
                    )));
                }
                _ => {
                    self.state.lock().auth_retried = false;
                    debug!(resumed = last_event_id.is_some(), "SSE stream opened");
                    return Ok(Some(response));
                }
            }
        }
    }

    async fn read_stream(
        &self,
        response: Response,
        cursor: &mut StreamCursor,
    ) -> TransportResult<()> {
        let mut parser = SseParser::new();
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                TransportError::ReceiveFailed(format!("SSE stream disconnected: {e}"))
            })?;
            for event in parser.feed(&chunk) {
                cursor.received += 1;
                if let Some(retry) = event.retry {
                    cursor.retry_hint = Some(Duration::from_millis(retry.into()));
                }
                if let (Some(id), Some(callback)) = (&event.id, &cursor.on_resumption_token) {
                    callback(id.clone());
                }
                if !event.is_message() {
                    trace!(event = event.event_type(), "ignoring SSE event");
                    continue;
                }
                match event.decode_message() {
                    Ok(message) => self.deliver(cursor.readdress(message)),
                    Err(e) => {
                        self.emitter.emit_error(TransportError::SerializationFailed(format!(
                            "Invalid SSE message: {e}"
                        )));
                    }
                }
            }
            if let Some(id) = parser.last_event_id() {
                cursor.last_event_id = Some(id.to_string());
            }
        }
        Ok(())
    }

    /// Wait before the next reconnection. `false` when giving up.
    async fn backoff(&self, attempt: &mut u32, cursor: &StreamCursor) -> bool {
        let reconnection = &self.config.reconnection;
        if !reconnection.allows(*attempt) {
            self.emitter.emit_error(TransportError::ConnectionFailed(format!(
                "Maximum reconnection attempts ({}) exceeded.",
                reconnection.max_retries
            )));
            return false;
        }
        let delay = cursor
            .retry_hint
            .unwrap_or_else(|| reconnection.delay(*attempt));
        *attempt += 1;
        debug!(
            attempt = *attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnecting SSE stream"
        );
        tokio::time::sleep(delay).await;
        !self.is_closed()
    }

    fn deliver(&self, message: JsonRpcMessage) {
        let extra = MessageExtra {
            session_id: self.state.lock().session_id.clone(),
            auth_token: None,
        };
        if !self.emitter.emit_message(message, extra) {
            trace!("message dropped, transport has no consumer");
        }
    }

    fn report(&self, error: TransportError) -> TransportError {
        self.emitter.emit_error(error.clone());
        error
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let tasks = std::mem::take(&mut self.state.lock().tasks);
        for task in tasks {
            task.abort();
        }
        self.emitter.emit_closed();
        debug!("client transport closed");
    }
}

fn challenge_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
