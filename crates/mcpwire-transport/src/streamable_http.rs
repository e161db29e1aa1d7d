//! Streamable HTTP server transport.
//!
//! One transport instance serves one session on a single endpoint:
//!
//! - **POST** carries client messages. A POST containing requests gets its own
//!   response stream (SSE, or a held-open JSON body) that ends once every
//!   request in it has been answered.
//! - **GET** opens the standalone push stream, or resumes an interrupted
//!   stream when `Last-Event-ID` is sent and an event store is configured.
//! - **DELETE** terminates the session.
//!
//! Outbound messages are routed by request id: responses go to the stream
//! that carried the request, other messages follow their
//! `related_request_id`, and everything else is pushed on the standalone
//! stream.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use mcpwire_core::{
    DEFAULT_NEGOTIATED_PROTOCOL_VERSION, ErrorKind, JsonRpcBatch, JsonRpcError, JsonRpcMessage,
    JsonRpcResponse, RequestId,
};
use mcpwire_streamable::headers::{CONTENT_TYPE_JSON, CONTENT_TYPE_SSE, lists_media_type};
use mcpwire_streamable::{
    EventId, EventStore, EventStoreError, STANDALONE_STREAM_ID, SseEncoder, SseEvent,
};
use mcpwire_transport_traits::{
    MessageExtra, Transport, TransportError, TransportEventEmitter, TransportEvents,
    TransportResult, TransportSendOptions,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::StreamableHttpServerConfig;

const MCP_SESSION_ID: HeaderName = HeaderName::from_static("mcp-session-id");
const MCP_PROTOCOL_VERSION: HeaderName = HeaderName::from_static("mcp-protocol-version");
const LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");

const CONNECTION_ERROR: i32 = ErrorKind::ConnectionClosed.default_code();
const PARSE_ERROR: i32 = ErrorKind::ParseError.default_code();
const INVALID_REQUEST: i32 = ErrorKind::InvalidRequest.default_code();

/// Detached streams kept for `Last-Event-ID` resumption before the oldest
/// is forgotten.
const DETACHED_STREAM_LIMIT: usize = 64;

enum StreamSink {
    Sse(mpsc::UnboundedSender<SseEvent>),
    Json(oneshot::Sender<Vec<JsonRpcMessage>>),
}

struct StreamEntry {
    /// Which HTTP connection currently owns the sink
    connection: u64,
    sink: Option<StreamSink>,
    request_ids: Vec<RequestId>,
    responses: HashMap<RequestId, JsonRpcMessage>,
}

impl StreamEntry {
    fn new(connection: u64, sink: StreamSink, request_ids: Vec<RequestId>) -> Self {
        Self {
            connection,
            sink: Some(sink),
            request_ids,
            responses: HashMap::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.request_ids
            .iter()
            .all(|id| self.responses.contains_key(id))
    }
}

#[derive(Default)]
struct ServerState {
    initialized: bool,
    terminated: bool,
    session_id: Option<String>,
    protocol_version: Option<String>,
    streams: HashMap<String, StreamEntry>,
    request_streams: HashMap<RequestId, String>,
    /// Streams whose connection dropped with replies still owed, oldest first
    detached: VecDeque<String>,
}

impl ServerState {
    fn remove_stream(&mut self, stream_id: &str) -> Option<StreamEntry> {
        let entry = self.streams.remove(stream_id)?;
        for request_id in &entry.request_ids {
            self.request_streams.remove(request_id);
        }
        self.detached.retain(|id| id != stream_id);
        Some(entry)
    }

    fn retain_detached(&mut self, stream_id: &str) {
        self.detached.retain(|id| id != stream_id);
        self.detached.push_back(stream_id.to_string());
        while self.detached.len() > DETACHED_STREAM_LIMIT {
            let Some(oldest) = self.detached.pop_front() else {
                break;
            };
            if self.streams.get(&oldest).is_some_and(|entry| entry.sink.is_none()) {
                self.remove_stream(&oldest);
                debug!(stream_id = %oldest, "evicted detached stream");
            }
        }
    }
}

struct Shared {
    config: StreamableHttpServerConfig,
    state: Mutex<ServerState>,
    emitter: TransportEventEmitter,
    events: Mutex<Option<TransportEvents>>,
    next_connection: AtomicU64,
    closed: AtomicBool,
}

/// Detaches a stream's sink when the HTTP response carrying it goes away.
struct StreamGuard {
    shared: Arc<Shared>,
    stream_id: String,
    connection: u64,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        // Only SSE streams backed by a store can be resumed.
        let resumable =
            self.shared.config.event_store.is_some() && !self.shared.config.enable_json_response;
        let mut state = self.shared.state.lock();
        let retain = match state.streams.get_mut(&self.stream_id) {
            Some(entry) if entry.connection == self.connection => {
                entry.sink = None;
                resumable && !entry.request_ids.is_empty()
            }
            _ => return,
        };
        if retain {
            state.retain_detached(&self.stream_id);
        } else {
            state.remove_stream(&self.stream_id);
        }
        trace!(stream_id = %self.stream_id, retain, "response stream detached");
    }
}

/// Server side of the streamable HTTP transport.
///
/// Cheap to clone. Mount [`router`](Self::router) in an axum application and
/// hand the transport to a protocol engine:
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use mcpwire_core::PeerRole;
/// use mcpwire_protocol::{Protocol, ProtocolOptions};
/// use mcpwire_transport::{StreamableHttpServerConfig, StreamableHttpServerTransport, serve};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = StreamableHttpServerTransport::new(StreamableHttpServerConfig::new());
/// let router = transport.router();
///
/// let server = Protocol::new(PeerRole::Server, ProtocolOptions::default());
/// server.connect(Arc::new(transport)).await?;
///
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
/// serve(listener, router).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StreamableHttpServerTransport {
    shared: Arc<Shared>,
}

impl StreamableHttpServerTransport {
    /// Create a transport. Nothing is served until the router is mounted.
    pub fn new(config: StreamableHttpServerConfig) -> Self {
        let (emitter, events) = TransportEventEmitter::new();
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(ServerState::default()),
                emitter,
                events: Mutex::new(Some(events)),
                next_connection: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Axum router serving GET, POST and DELETE on the configured endpoint
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                &self.shared.config.endpoint_path,
                get(handle_get).post(handle_post).delete(handle_delete),
            )
            .with_state(self.clone())
    }

    /// Transport configuration
    pub fn config(&self) -> &StreamableHttpServerConfig {
        &self.shared.config
    }

    /// Whether the session was initialized
    pub fn is_initialized(&self) -> bool {
        self.shared.state.lock().initialized
    }

    /// Whether the transport was closed
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Version recorded through [`Transport::set_protocol_version`]
    pub fn protocol_version(&self) -> Option<String> {
        self.shared.state.lock().protocol_version.clone()
    }
}

impl fmt::Debug for StreamableHttpServerTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("StreamableHttpServerTransport")
            .field("endpoint", &self.shared.config.endpoint_path)
            .field("session_id", &state.session_id)
            .field("initialized", &state.initialized)
            .field("streams", &state.streams.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Transport for StreamableHttpServerTransport {
    fn start(&self) -> Pin<Box<dyn Future<Output = TransportResult<TransportEvents>> + Send + '_>> {
        Box::pin(async move {
            self.shared
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
        Box::pin(self.shared.send(message, options))
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.shared.shutdown();
            Ok(())
        })
    }

    fn session_id(&self) -> Option<String> {
        self.shared.state.lock().session_id.clone()
    }

    fn set_protocol_version(&self, version: &str) {
        self.shared.state.lock().protocol_version = Some(version.to_string());
    }
}

async fn handle_post(
    State(transport): State<StreamableHttpServerTransport>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    transport
        .shared
        .post(&headers, &body)
        .await
        .unwrap_or_else(|response| response)
}

async fn handle_get(
    State(transport): State<StreamableHttpServerTransport>,
    headers: HeaderMap,
) -> Response {
    transport
        .shared
        .get(&headers)
        .await
        .unwrap_or_else(|response| response)
}

async fn handle_delete(
    State(transport): State<StreamableHttpServerTransport>,
    headers: HeaderMap,
) -> Response {
    transport
        .shared
        .delete(&headers)
        .unwrap_or_else(|response| response)
}

impl Shared {
    async fn post(
        self: &Arc<Self>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Response, Response> {
        let accept = header_str(headers, &header::ACCEPT).unwrap_or_default();
        let accepts_both = lists_media_type(accept, CONTENT_TYPE_JSON)
            && lists_media_type(accept, CONTENT_TYPE_SSE);
        if !accepts_both {
            return Err(error_response(
                StatusCode::NOT_ACCEPTABLE,
                CONNECTION_ERROR,
                "Not Acceptable: Client must accept both application/json and text/event-stream",
            ));
        }
        let content_type = header_str(headers, &header::CONTENT_TYPE).unwrap_or_default();
        if !lists_media_type(content_type, CONTENT_TYPE_JSON) {
            return Err(error_response(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                CONNECTION_ERROR,
                "Unsupported Media Type: Content-Type must be application/json",
            ));
        }
        self.ensure_open()?;

        let raw: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
            error_response(StatusCode::BAD_REQUEST, PARSE_ERROR, format!("Parse error: {e}"))
        })?;
        let messages = serde_json::from_value::<JsonRpcBatch>(raw)
            .map_err(|e| {
                error_response(
                    StatusCode::BAD_REQUEST,
                    INVALID_REQUEST,
                    format!("Invalid Request: {e}"),
                )
            })?
            .into_messages();
        if messages.is_empty() {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                INVALID_REQUEST,
                "Invalid Request: empty batch",
            ));
        }

        if messages.iter().any(JsonRpcMessage::is_initialize_request) {
            self.initialize(messages.len())?;
        } else {
            self.validate_session(headers)?;
            self.validate_protocol_version(headers)?;
        }

        let session_id = self.state.lock().session_id.clone();
        let extra = MessageExtra {
            session_id: session_id.clone(),
            auth_token: bearer_token(headers),
        };
        let request_ids: Vec<RequestId> = messages
            .iter()
            .filter_map(|message| match message {
                JsonRpcMessage::Request(request) => Some(request.id.clone()),
                _ => None,
            })
            .collect();

        if request_ids.is_empty() {
            self.dispatch(messages, &extra);
            return Ok(StatusCode::ACCEPTED.into_response());
        }

        let stream_id = Uuid::new_v4().to_string();
        let guard = self.guard(&stream_id);
        debug!(stream_id = %stream_id, requests = request_ids.len(), "response stream opened");

        if self.config.enable_json_response {
            let (tx, rx) = oneshot::channel();
            self.register_stream(&stream_id, guard.connection, StreamSink::Json(tx), request_ids);
            self.dispatch(messages, &extra);

            let responses = rx.await.map_err(|_| {
                error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    CONNECTION_ERROR,
                    "Connection closed",
                )
            })?;
            drop(guard);
            let body = match <[JsonRpcMessage; 1]>::try_from(responses) {
                Ok([single]) => JsonRpcBatch::from(single),
                Err(many) => JsonRpcBatch::from(many),
            };
            return Ok(with_session_header(Json(body).into_response(), session_id.as_deref()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.register_stream(&stream_id, guard.connection, StreamSink::Sse(tx), request_ids);
        self.dispatch(messages, &extra);
        Ok(with_session_header(
            self.sse_response(rx, guard),
            session_id.as_deref(),
        ))
    }

    async fn get(self: &Arc<Self>, headers: &HeaderMap) -> Result<Response, Response> {
        let accept = header_str(headers, &header::ACCEPT).unwrap_or_default();
        if !lists_media_type(accept, CONTENT_TYPE_SSE) {
            return Err(error_response(
                StatusCode::NOT_ACCEPTABLE,
                CONNECTION_ERROR,
                "Not Acceptable: Client must accept text/event-stream",
            ));
        }
        self.ensure_open()?;
        self.validate_session(headers)?;
        self.validate_protocol_version(headers)?;
        let session_id = self.state.lock().session_id.clone();

        if let (Some(store), Some(last_event_id)) = (
            self.config.event_store.clone(),
            header_str(headers, &LAST_EVENT_ID),
        ) {
            let response = self.replay(store, last_event_id).await?;
            return Ok(with_session_header(response, session_id.as_deref()));
        }

        let guard = self.guard(STANDALONE_STREAM_ID);
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state.lock();
            if state
                .streams
                .get(STANDALONE_STREAM_ID)
                .is_some_and(|entry| entry.sink.is_some())
            {
                return Err(error_response(
                    StatusCode::CONFLICT,
                    CONNECTION_ERROR,
                    "Conflict: Only one SSE stream is allowed per session",
                ));
            }
            state.streams.insert(
                STANDALONE_STREAM_ID.to_string(),
                StreamEntry::new(guard.connection, StreamSink::Sse(tx), Vec::new()),
            );
        }
        debug!("standalone stream opened");
        Ok(with_session_header(
            self.sse_response(rx, guard),
            session_id.as_deref(),
        ))
    }

    fn delete(self: &Arc<Self>, headers: &HeaderMap) -> Result<Response, Response> {
        self.ensure_open()?;
        self.validate_session(headers)?;
        self.validate_protocol_version(headers)?;

        let session_id = self.state.lock().session_id.clone();
        if let (Some(id), Some(on_closed)) = (&session_id, &self.config.on_session_closed) {
            on_closed(id);
        }
        info!(session_id = ?session_id, "session terminated by client");
        self.shutdown();
        Ok(StatusCode::OK.into_response())
    }

    async fn replay(
        self: &Arc<Self>,
        store: Arc<dyn EventStore>,
        last_event_id: &str,
    ) -> Result<Response, Response> {
        let (sink, mut replayed) = mpsc::unbounded_channel();
        let stream_id = store
            .replay_events_after(last_event_id, sink)
            .await
            .map_err(|e| match e {
                EventStoreError::UnknownEventId(_) => error_response(
                    StatusCode::BAD_REQUEST,
                    CONNECTION_ERROR,
                    format!("Bad Request: {e}"),
                ),
                other => error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    CONNECTION_ERROR,
                    other.to_string(),
                ),
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut count = 0usize;
        while let Ok((event_id, message)) = replayed.try_recv() {
            match SseEvent::message(&message) {
                Ok(event) => {
                    let _ = tx.send(event.with_id(event_id));
                    count += 1;
                }
                Err(err) => warn!(error = %err, "skipping unencodable stored event"),
            }
        }

        let guard = self.guard(&stream_id);
        {
            let mut state = self.state.lock();
            match state.streams.get_mut(&stream_id) {
                Some(entry) if entry.sink.is_some() => {
                    return Err(error_response(
                        StatusCode::CONFLICT,
                        CONNECTION_ERROR,
                        "Conflict: Only one SSE stream is allowed per session",
                    ));
                }
                Some(entry) => {
                    entry.connection = guard.connection;
                    entry.sink = Some(StreamSink::Sse(tx));
                    state.detached.retain(|id| id != &stream_id);
                }
                None if stream_id == STANDALONE_STREAM_ID => {
                    state.streams.insert(
                        stream_id.clone(),
                        StreamEntry::new(guard.connection, StreamSink::Sse(tx), Vec::new()),
                    );
                }
                // The stream already finished; the client only gets the replay.
                None => drop(tx),
            }
        }
        debug!(stream_id = %stream_id, replayed = count, "stream resumed");
        Ok(self.sse_response(rx, guard))
    }

    fn initialize(&self, batch_len: usize) -> Result<(), Response> {
        let session_id = {
            let mut state = self.state.lock();
            if state.initialized && self.config.is_stateful() {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    INVALID_REQUEST,
                    "Invalid Request: Server already initialized",
                ));
            }
            if batch_len > 1 {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    INVALID_REQUEST,
                    "Invalid Request: Only one initialization request is allowed",
                ));
            }
            let session_id = self.config.session_id_generator.as_ref().map(|generate| generate());
            state.session_id.clone_from(&session_id);
            state.initialized = true;
            session_id
        };

        if let Some(id) = &session_id {
            info!(session_id = %id, "session initialized");
            if let Some(on_initialized) = &self.config.on_session_initialized {
                on_initialized(id);
            }
        }
        Ok(())
    }

    fn validate_session(&self, headers: &HeaderMap) -> Result<(), Response> {
        if !self.config.is_stateful() {
            return Ok(());
        }
        let state = self.state.lock();
        if !state.initialized {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                CONNECTION_ERROR,
                "Bad Request: Server not initialized",
            ));
        }

        let mut values = headers.get_all(&MCP_SESSION_ID).iter();
        let Some(value) = values.next() else {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                CONNECTION_ERROR,
                "Bad Request: Mcp-Session-Id header is required",
            ));
        };
        if values.next().is_some() {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                CONNECTION_ERROR,
                "Bad Request: Mcp-Session-Id header must be a single value",
            ));
        }
        if state.terminated || value.to_str().ok() != state.session_id.as_deref() {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                CONNECTION_ERROR,
                "Session not found",
            ));
        }
        Ok(())
    }

    fn validate_protocol_version(&self, headers: &HeaderMap) -> Result<(), Response> {
        let version = match headers.get(&MCP_PROTOCOL_VERSION) {
            Some(value) => value.to_str().unwrap_or_default(),
            None => DEFAULT_NEGOTIATED_PROTOCOL_VERSION,
        };
        let supported = &self.config.supported_protocol_versions;
        if supported.iter().any(|v| v == version) {
            return Ok(());
        }
        Err(error_response(
            StatusCode::BAD_REQUEST,
            CONNECTION_ERROR,
            format!(
                "Bad Request: Unsupported protocol version (supported versions: {})",
                supported.join(", ")
            ),
        ))
    }

    fn ensure_open(&self) -> Result<(), Response> {
        if self.closed.load(Ordering::Acquire) {
            return Err(error_response(
                StatusCode::NOT_FOUND,
                CONNECTION_ERROR,
                "Session not found",
            ));
        }
        Ok(())
    }

    fn guard(self: &Arc<Self>, stream_id: &str) -> StreamGuard {
        StreamGuard {
            shared: Arc::clone(self),
            stream_id: stream_id.to_string(),
            connection: self.next_connection.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn register_stream(
        &self,
        stream_id: &str,
        connection: u64,
        sink: StreamSink,
        request_ids: Vec<RequestId>,
    ) {
        let mut state = self.state.lock();
        for id in &request_ids {
            state.request_streams.insert(id.clone(), stream_id.to_string());
        }
        state.streams.insert(
            stream_id.to_string(),
            StreamEntry::new(connection, sink, request_ids),
        );
    }

    fn dispatch(&self, messages: Vec<JsonRpcMessage>, extra: &MessageExtra) {
        for message in messages {
            if !self.emitter.emit_message(message, extra.clone()) {
                warn!("message dropped, transport has no consumer");
            }
        }
    }

    fn sse_response(&self, rx: mpsc::UnboundedReceiver<SseEvent>, guard: StreamGuard) -> Response {
        let keep_alive = self.config.keep_alive;
        let stream = async_stream::stream! {
            let _guard = guard;
            let mut rx = rx;
            let mut ticker = keep_alive.map(|period| {
                let start = tokio::time::Instant::now() + period;
                let mut ticker = tokio::time::interval_at(start, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            loop {
                let frame = match ticker.as_mut() {
                    Some(ticker) => tokio::select! {
                        event = rx.recv() => event.map(|event| SseEncoder::encode(&event)),
                        _ = ticker.tick() => Some(SseEncoder::keepalive().to_string()),
                    },
                    None => rx.recv().await.map(|event| SseEncoder::encode(&event)),
                };
                match frame {
                    Some(frame) => yield Ok::<_, Infallible>(Bytes::from(frame)),
                    None => break,
                }
            }
        };

        let mut response = Body::from_stream(stream).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_SSE));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        response
    }

    async fn send(
        &self,
        message: JsonRpcMessage,
        options: TransportSendOptions,
    ) -> TransportResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::NotConnected);
        }
        let correlation = match &message {
            JsonRpcMessage::Response(response) => {
                Some(response.request_id().cloned().ok_or_else(|| {
                    TransportError::ProtocolError(
                        "Cannot send a response without an id on the standalone stream"
                            .to_string(),
                    )
                })?)
            }
            _ => options.related_request_id,
        };

        match correlation {
            None => self.send_standalone(message).await,
            Some(id) => self.send_correlated(id, message).await,
        }
    }

    async fn send_standalone(&self, message: JsonRpcMessage) -> TransportResult<()> {
        let event = self.sse_event(STANDALONE_STREAM_ID, &message).await?;
        let state = self.state.lock();
        match state
            .streams
            .get(STANDALONE_STREAM_ID)
            .and_then(|entry| entry.sink.as_ref())
        {
            Some(StreamSink::Sse(tx)) => {
                let _ = tx.send(event);
            }
            _ => debug!(
                method = message.method().unwrap_or_default(),
                "no standalone stream open, message not delivered"
            ),
        }
        Ok(())
    }

    async fn send_correlated(&self, id: RequestId, message: JsonRpcMessage) -> TransportResult<()> {
        let stream_id = self
            .state
            .lock()
            .request_streams
            .get(&id)
            .cloned()
            .ok_or_else(|| {
                TransportError::ProtocolError(format!(
                    "No connection established for request ID: {id}"
                ))
            })?;

        if !self.config.enable_json_response {
            let event = self.sse_event(&stream_id, &message).await?;
            let state = self.state.lock();
            if let Some(StreamSink::Sse(tx)) = state
                .streams
                .get(&stream_id)
                .and_then(|entry| entry.sink.as_ref())
            {
                let _ = tx.send(event);
            }
        }
        if !message.is_response() {
            return Ok(());
        }

        let entry = {
            let mut state = self.state.lock();
            let Some(entry) = state.streams.get_mut(&stream_id) else {
                return Ok(());
            };
            entry.responses.insert(id, message);
            if !entry.is_complete() {
                return Ok(());
            }
            let Some(entry) = state.remove_stream(&stream_id) else {
                return Ok(());
            };
            entry
        };

        debug!(stream_id = %stream_id, "all responses sent, closing stream");
        if let Some(StreamSink::Json(tx)) = entry.sink {
            let mut responses = entry.responses;
            let ordered = entry
                .request_ids
                .iter()
                .filter_map(|request_id| responses.remove(request_id))
                .collect();
            let _ = tx.send(ordered);
        }
        Ok(())
    }

    /// Encode `message` for `stream_id`, storing it first when resumability is on.
    async fn sse_event(
        &self,
        stream_id: &str,
        message: &JsonRpcMessage,
    ) -> TransportResult<SseEvent> {
        let event = SseEvent::message(message)?;
        let event_id: Option<EventId> = match &self.config.event_store {
            Some(store) => Some(
                store
                    .store_event(stream_id, message)
                    .await
                    .map_err(|e| TransportError::SendFailed(e.to_string()))?,
            ),
            None => None,
        };
        Ok(match event_id {
            Some(id) => event.with_id(id),
            None => event,
        })
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let streams = {
            let mut state = self.state.lock();
            state.terminated = true;
            state.request_streams.clear();
            state.detached.clear();
            std::mem::take(&mut state.streams)
        };
        debug!(streams = streams.len(), "closing streamable HTTP transport");
        drop(streams);
        self.emitter.emit_closed();
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    header_str(headers, &header::AUTHORIZATION)
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

fn with_session_header(mut response: Response, session_id: Option<&str>) -> Response {
    if let Some(value) = session_id.and_then(|id| HeaderValue::from_str(id).ok()) {
        response.headers_mut().insert(MCP_SESSION_ID, value);
    }
    response
}

fn error_response(status: StatusCode, code: i32, message: impl Into<String>) -> Response {
    let body = JsonRpcResponse::uncorrelated_error(JsonRpcError::new(code, message));
    (status, Json(body)).into_response()
}
