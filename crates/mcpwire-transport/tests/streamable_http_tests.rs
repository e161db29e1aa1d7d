//! HTTP-level tests for the streamable HTTP server transport.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, BodyDataStream};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use futures::StreamExt;
use mcpwire_core::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, PeerRole, RequestId,
};
use mcpwire_protocol::{Protocol, ProtocolOptions};
use mcpwire_streamable::{InMemoryEventStore, SseEvent, SseParser};
use mcpwire_transport::{StreamableHttpServerConfig, StreamableHttpServerTransport};
use mcpwire_transport_traits::{
    MessageExtra, Transport, TransportError, TransportEvent, TransportEvents,
    TransportSendOptions,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

const SESSION: &str = "session-abc";
const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mcpwire_transport=debug")
        .with_test_writer()
        .try_init();
}

fn test_config() -> StreamableHttpServerConfig {
    StreamableHttpServerConfig::new()
        .with_session_id_generator(|| SESSION.to_string())
        .without_keep_alive()
}

async fn started(
    config: StreamableHttpServerConfig,
) -> (StreamableHttpServerTransport, Router, TransportEvents) {
    init_tracing();
    let transport = StreamableHttpServerTransport::new(config);
    let router = transport.router();
    let events = transport.start().await.unwrap();
    (transport, router, events)
}

fn post(session: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::post("/mcp")
        .header(header::ACCEPT, "application/json, text/event-stream")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(session) = session {
        builder = builder.header("mcp-session-id", session);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_stream(session: &str) -> axum::http::request::Builder {
    Request::get("/mcp")
        .header(header::ACCEPT, "text/event-stream")
        .header("mcp-session-id", session)
}

fn initialize_body(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": { "name": "test", "version": "1.0" }
        }
    })
}

fn request_body(id: i64, method: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method })
}

async fn call(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn error_of(response: Response) -> (i64, String) {
    let body = json_body(response).await;
    assert_eq!(body["id"], Value::Null);
    (
        body["error"]["code"].as_i64().unwrap(),
        body["error"]["message"].as_str().unwrap().to_string(),
    )
}

async fn next_message(events: &mut TransportEvents) -> (JsonRpcMessage, MessageExtra) {
    match tokio::time::timeout(WAIT, events.recv()).await.unwrap() {
        Some(TransportEvent::Message { message, extra }) => (message, extra),
        other => panic!("expected message event, got {other:?}"),
    }
}

fn request_id(message: &JsonRpcMessage) -> RequestId {
    match message {
        JsonRpcMessage::Request(request) => request.id.clone(),
        other => panic!("expected request, got {other:?}"),
    }
}

struct SseReader {
    body: BodyDataStream,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
}

impl SseReader {
    fn new(response: Response) -> Self {
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        Self {
            body: response.into_body().into_data_stream(),
            parser: SseParser::new(),
            pending: VecDeque::new(),
        }
    }

    async fn next_event(&mut self) -> Option<SseEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            let chunk = tokio::time::timeout(WAIT, self.body.next())
                .await
                .expect("timed out waiting for SSE data")?;
            self.pending.extend(self.parser.feed(&chunk.unwrap()));
        }
    }

    async fn next_message(&mut self) -> JsonRpcMessage {
        self.next_event().await.unwrap().decode_message().unwrap()
    }
}

/// Run the initialize handshake and return the session id header.
async fn initialize(
    router: &Router,
    transport: &StreamableHttpServerTransport,
    events: &mut TransportEvents,
) -> Option<String> {
    let response = call(router, post(None, &initialize_body(0))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let session = response
        .headers()
        .get("mcp-session-id")
        .map(|v| v.to_str().unwrap().to_string());

    let (message, _) = next_message(events).await;
    let reply = JsonRpcResponse::success(
        json!({ "protocolVersion": "2025-06-18" }),
        request_id(&message),
    );
    transport
        .send(reply.into(), TransportSendOptions::new())
        .await
        .unwrap();

    let mut sse = SseReader::new(response);
    assert!(sse.next_message().await.is_response());
    assert!(sse.next_event().await.is_none());
    session
}

#[tokio::test]
async fn test_post_requires_both_accept_types() {
    let (_transport, router, _events) = started(test_config()).await;
    let request = Request::post("/mcp")
        .header(header::ACCEPT, "application/json")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(initialize_body(0).to_string()))
        .unwrap();

    let response = call(&router, request).await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    let (code, _) = error_of(response).await;
    assert_eq!(code, -32000);
}

#[tokio::test]
async fn test_post_requires_json_content_type() {
    let (_transport, router, _events) = started(test_config()).await;
    let request = Request::post("/mcp")
        .header(header::ACCEPT, "application/json, text/event-stream")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(initialize_body(0).to_string()))
        .unwrap();

    let response = call(&router, request).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_malformed_bodies() {
    let (_transport, router, _events) = started(test_config()).await;

    let request = Request::post("/mcp")
        .header(header::ACCEPT, "application/json, text/event-stream")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = call(&router, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await.0, -32700);

    let response = call(&router, post(None, &json!({ "foo": 1 }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await.0, -32600);

    let response = call(&router, post(None, &json!([]))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(response).await.0, -32600);
}

#[tokio::test]
async fn test_initialize_mints_session() {
    let opened = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&opened);
    let config =
        test_config().with_on_session_initialized(move |id| seen.lock().push(id.to_string()));
    let (transport, router, mut events) = started(config).await;

    let session = initialize(&router, &transport, &mut events).await;

    assert_eq!(session.as_deref(), Some(SESSION));
    assert_eq!(transport.session_id().as_deref(), Some(SESSION));
    assert_eq!(*opened.lock(), vec![SESSION.to_string()]);
}

#[tokio::test]
async fn test_initialize_message_carries_session() {
    let (_transport, router, mut events) = started(test_config()).await;
    let _response = call(&router, post(None, &initialize_body(0))).await;

    let (message, extra) = next_message(&mut events).await;
    assert!(message.is_initialize_request());
    assert_eq!(extra.session_id.as_deref(), Some(SESSION));
}

#[tokio::test]
async fn test_second_initialize_rejected() {
    let (transport, router, mut events) = started(test_config()).await;
    initialize(&router, &transport, &mut events).await;

    let response = call(&router, post(Some(SESSION), &initialize_body(1))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let (code, message) = error_of(response).await;
    assert_eq!(code, -32600);
    assert_eq!(message, "Invalid Request: Server already initialized");
}

#[tokio::test]
async fn test_batched_initialize_rejected() {
    let (_transport, router, _events) = started(test_config()).await;
    let batch = json!([initialize_body(0), request_body(1, "ping")]);

    let response = call(&router, post(None, &batch)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let (_, message) = error_of(response).await;
    assert_eq!(message, "Invalid Request: Only one initialization request is allowed");
}

#[tokio::test]
async fn test_requests_before_initialize_rejected() {
    let (_transport, router, _events) = started(test_config()).await;

    let response = call(&router, post(Some(SESSION), &request_body(1, "ping"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let (_, message) = error_of(response).await;
    assert_eq!(message, "Bad Request: Server not initialized");
}

#[tokio::test]
async fn test_session_header_gating() {
    let (transport, router, mut events) = started(test_config()).await;
    initialize(&router, &transport, &mut events).await;

    let response = call(&router, post(None, &request_body(1, "ping"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let (code, message) = error_of(response).await;
    assert_eq!(code, -32000);
    assert_eq!(message, "Bad Request: Mcp-Session-Id header is required");

    let response = call(&router, post(Some("someone-else"), &request_body(1, "ping"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_of(response).await.1, "Session not found");
}

#[tokio::test]
async fn test_unsupported_protocol_version() {
    let (transport, router, mut events) = started(test_config()).await;
    initialize(&router, &transport, &mut events).await;

    let mut request = post(Some(SESSION), &request_body(1, "ping"));
    request
        .headers_mut()
        .insert("mcp-protocol-version", "1999-01-01".parse().unwrap());
    let response = call(&router, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let (_, message) = error_of(response).await;
    assert!(message.starts_with("Bad Request: Unsupported protocol version"));
    assert!(message.contains("2025-06-18"));
}

#[tokio::test]
async fn test_notifications_only_accepted() {
    let (transport, router, mut events) = started(test_config()).await;
    initialize(&router, &transport, &mut events).await;

    let note = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let response = call(&router, post(Some(SESSION), &note)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let (message, extra) = next_message(&mut events).await;
    assert_eq!(message.method(), Some("notifications/initialized"));
    assert_eq!(extra.session_id.as_deref(), Some(SESSION));
}

#[tokio::test]
async fn test_bearer_token_forwarded() {
    let (transport, router, mut events) = started(test_config()).await;
    initialize(&router, &transport, &mut events).await;

    let mut request = post(Some(SESSION), &request_body(1, "ping"));
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer secret-token".parse().unwrap());
    let _response = call(&router, request).await;

    let (_, extra) = next_message(&mut events).await;
    assert_eq!(extra.auth_token.as_deref(), Some("secret-token"));
}

#[tokio::test]
async fn test_batch_stream_closes_after_all_responses() {
    let (transport, router, mut events) = started(test_config()).await;
    initialize(&router, &transport, &mut events).await;

    let batch = json!([request_body(1, "tools/list"), request_body(2, "ping")]);
    let response = call(&router, post(Some(SESSION), &batch)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["mcp-session-id"], SESSION);
    let mut sse = SseReader::new(response);

    let (first, _) = next_message(&mut events).await;
    let (second, _) = next_message(&mut events).await;
    assert_eq!(request_id(&first), RequestId::Number(1));

    // progress related to the first request rides the same stream
    let progress = JsonRpcNotification::new(
        "notifications/progress",
        Some(json!({ "progressToken": 1, "progress": 50 })),
    );
    transport
        .send(
            progress.into(),
            TransportSendOptions::new().with_related_request_id(RequestId::Number(1)),
        )
        .await
        .unwrap();
    transport
        .send(
            JsonRpcResponse::success(json!({}), request_id(&second)).into(),
            TransportSendOptions::new(),
        )
        .await
        .unwrap();
    transport
        .send(
            JsonRpcResponse::success(json!({ "tools": [] }), request_id(&first)).into(),
            TransportSendOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        sse.next_message().await.method(),
        Some("notifications/progress")
    );
    assert_eq!(
        sse.next_message().await.response_id(),
        Some(&RequestId::Number(2))
    );
    assert_eq!(
        sse.next_message().await.response_id(),
        Some(&RequestId::Number(1))
    );
    assert!(sse.next_event().await.is_none());

    // the request ids are no longer routable
    let late = JsonRpcNotification::new("notifications/progress", None);
    assert!(
        transport
            .send(
                late.into(),
                TransportSendOptions::new().with_related_request_id(RequestId::Number(1)),
            )
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_json_response_mode() {
    let (transport, router, mut events) = started(test_config().with_json_response(true)).await;

    let response = call(&router, post(None, &initialize_body(0)));
    let responder = async {
        let (message, _) = next_message(&mut events).await;
        transport
            .send(
                JsonRpcResponse::success(json!({}), request_id(&message)).into(),
                TransportSendOptions::new(),
            )
            .await
            .unwrap();
    };
    let (response, ()) = tokio::join!(response, responder);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["mcp-session-id"], SESSION);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let body = json_body(response).await;
    assert_eq!(body["id"], 0);

    let batch = json!([request_body(1, "tools/list"), request_body(2, "ping")]);
    let response = call(&router, post(Some(SESSION), &batch));
    let responder = async {
        let (first, _) = next_message(&mut events).await;
        let (second, _) = next_message(&mut events).await;
        for message in [second, first] {
            transport
                .send(
                    JsonRpcResponse::success(json!({}), request_id(&message)).into(),
                    TransportSendOptions::new(),
                )
                .await
                .unwrap();
        }
    };
    let (response, ()) = tokio::join!(response, responder);
    let body = json_body(response).await;
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_standalone_stream_push_and_conflict() {
    let (transport, router, mut events) = started(test_config()).await;
    initialize(&router, &transport, &mut events).await;

    let response = call(&router, get_stream(SESSION).body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut sse = SseReader::new(response);

    let second = call(&router, get_stream(SESSION).body(Body::empty()).unwrap()).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(
        error_of(second).await.1,
        "Conflict: Only one SSE stream is allowed per session"
    );

    let note = JsonRpcNotification::new("notifications/tools/list_changed", None);
    transport
        .send(note.into(), TransportSendOptions::new())
        .await
        .unwrap();
    assert_eq!(
        sse.next_message().await.method(),
        Some("notifications/tools/list_changed")
    );

    // a dropped stream frees the slot
    drop(sse);
    let again = call(&router, get_stream(SESSION).body(Body::empty()).unwrap()).await;
    assert_eq!(again.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_requires_event_stream_accept() {
    let (transport, router, mut events) = started(test_config()).await;
    initialize(&router, &transport, &mut events).await;

    let request = Request::get("/mcp")
        .header(header::ACCEPT, "application/json")
        .header("mcp-session-id", SESSION)
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(&router, request).await.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn test_resume_standalone_stream() {
    let store = Arc::new(InMemoryEventStore::new());
    let (transport, router, mut events) = started(test_config().with_event_store(store)).await;
    initialize(&router, &transport, &mut events).await;

    let response = call(&router, get_stream(SESSION).body(Body::empty()).unwrap()).await;
    let mut sse = SseReader::new(response);
    let mut ids = Vec::new();
    for n in 1..=5 {
        let note = JsonRpcNotification::new("notifications/message", Some(json!({ "n": n })));
        transport
            .send(note.into(), TransportSendOptions::new())
            .await
            .unwrap();
        ids.push(sse.next_event().await.unwrap().id.unwrap());
    }
    assert!(ids.iter().all(|id| id.starts_with("_GET_stream_")));
    drop(sse);

    let request = get_stream(SESSION)
        .header("last-event-id", ids[1].as_str())
        .body(Body::empty())
        .unwrap();
    let response = call(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut replay = SseReader::new(response);

    let mut replayed = Vec::new();
    for _ in 0..3 {
        replayed.push(replay.next_event().await.unwrap().id.unwrap());
    }
    assert_eq!(replayed, ids[2..].to_vec());

    // the resumed stream keeps receiving live pushes
    let note = JsonRpcNotification::new("notifications/message", Some(json!({ "n": 6 })));
    transport
        .send(note.into(), TransportSendOptions::new())
        .await
        .unwrap();
    let live = replay.next_message().await;
    assert_eq!(live.method(), Some("notifications/message"));
}

#[tokio::test]
async fn test_resume_rejected_while_stream_is_live() {
    let store = Arc::new(InMemoryEventStore::new());
    let (transport, router, mut events) = started(test_config().with_event_store(store)).await;
    initialize(&router, &transport, &mut events).await;

    let response = call(&router, get_stream(SESSION).body(Body::empty()).unwrap()).await;
    let mut live = SseReader::new(response);
    let note = JsonRpcNotification::new("notifications/message", None);
    transport
        .send(note.into(), TransportSendOptions::new())
        .await
        .unwrap();
    let event_id = live.next_event().await.unwrap().id.unwrap();

    let request = get_stream(SESSION)
        .header("last-event-id", event_id.as_str())
        .body(Body::empty())
        .unwrap();
    let response = call(&router, request).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        error_of(response).await.1,
        "Conflict: Only one SSE stream is allowed per session"
    );

    // the original stream still owns the slot
    let note = JsonRpcNotification::new("notifications/message", Some(json!({ "n": 2 })));
    transport
        .send(note.into(), TransportSendOptions::new())
        .await
        .unwrap();
    assert_eq!(live.next_message().await.method(), Some("notifications/message"));
}

/// POST a request, wait for it to reach the server, then drop the response
/// stream before anything is answered.
async fn abandon_request(router: &Router, events: &mut TransportEvents, id: i64) -> RequestId {
    let response = call(router, post(Some(SESSION), &request_body(id, "tools/list"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let (message, _) = next_message(events).await;
    drop(response);
    request_id(&message)
}

#[tokio::test]
async fn test_abandoned_stream_forgotten_without_store() {
    let (transport, router, mut events) = started(test_config()).await;
    initialize(&router, &transport, &mut events).await;

    let id = abandon_request(&router, &mut events, 1).await;
    let err = transport
        .send(
            JsonRpcResponse::success(json!({}), id).into(),
            TransportSendOptions::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransportError::ProtocolError("No connection established for request ID: 1".into())
    );
}

#[tokio::test]
async fn test_abandoned_json_request_forgotten() {
    let store = Arc::new(InMemoryEventStore::new());
    let config = test_config().with_json_response(true).with_event_store(store);
    let (transport, router, mut events) = started(config).await;

    let response = call(&router, post(None, &initialize_body(0)));
    let responder = async {
        let (message, _) = next_message(&mut events).await;
        transport
            .send(
                JsonRpcResponse::success(json!({}), request_id(&message)).into(),
                TransportSendOptions::new(),
            )
            .await
            .unwrap();
    };
    let (response, ()) = tokio::join!(response, responder);
    assert_eq!(response.status(), StatusCode::OK);

    let mut pending = Box::pin(call(&router, post(Some(SESSION), &request_body(1, "ping"))));
    let id = tokio::select! {
        _ = &mut pending => panic!("JSON body completed before any reply"),
        (message, _) = next_message(&mut events) => request_id(&message),
    };
    drop(pending);

    assert!(
        transport
            .send(
                JsonRpcResponse::success(json!({}), id).into(),
                TransportSendOptions::new(),
            )
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_detached_streams_retained_up_to_a_bound() {
    let store = Arc::new(InMemoryEventStore::new());
    let (transport, router, mut events) = started(test_config().with_event_store(store)).await;
    initialize(&router, &transport, &mut events).await;

    // one more than the server keeps around for resumption
    let mut ids = Vec::new();
    for n in 1..=65 {
        ids.push(abandon_request(&router, &mut events, n).await);
    }

    let newest = ids.pop().unwrap();
    transport
        .send(
            JsonRpcResponse::success(json!({}), newest).into(),
            TransportSendOptions::new(),
        )
        .await
        .unwrap();

    let oldest = ids.remove(0);
    assert!(
        transport
            .send(
                JsonRpcResponse::success(json!({}), oldest).into(),
                TransportSendOptions::new(),
            )
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_unknown_last_event_id() {
    let store = Arc::new(InMemoryEventStore::new());
    let (transport, router, mut events) = started(test_config().with_event_store(store)).await;
    initialize(&router, &transport, &mut events).await;

    let request = get_stream(SESSION)
        .header("last-event-id", "missing_42")
        .body(Body::empty())
        .unwrap();
    let response = call(&router, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_terminates_session() {
    let closed = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&closed);
    let config = test_config().with_on_session_closed(move |id| seen.lock().push(id.to_string()));
    let (transport, router, mut events) = started(config).await;
    initialize(&router, &transport, &mut events).await;

    let request = Request::delete("/mcp")
        .header("mcp-session-id", SESSION)
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(&router, request).await.status(), StatusCode::OK);

    assert_eq!(*closed.lock(), vec![SESSION.to_string()]);
    assert!(transport.is_closed());
    assert!(matches!(
        tokio::time::timeout(WAIT, events.recv()).await.unwrap(),
        Some(TransportEvent::Closed)
    ));

    let response = call(&router, post(Some(SESSION), &request_body(1, "ping"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stateless_mode_skips_session_checks() {
    let (transport, router, mut events) = started(test_config().stateless()).await;
    let session = initialize(&router, &transport, &mut events).await;
    assert_eq!(session, None);

    let response = call(&router, post(None, &request_body(1, "ping"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("mcp-session-id").is_none());

    let (message, extra) = next_message(&mut events).await;
    assert_eq!(extra.session_id, None);
    transport
        .send(
            JsonRpcResponse::success(json!({}), request_id(&message)).into(),
            TransportSendOptions::new(),
        )
        .await
        .unwrap();
    let mut sse = SseReader::new(response);
    assert_eq!(sse.next_message().await.response_id(), Some(&RequestId::Number(1)));
}

#[tokio::test]
async fn test_protocol_engine_over_http() {
    let transport = StreamableHttpServerTransport::new(test_config());
    let router = transport.router();

    let server = Protocol::new(PeerRole::Server, ProtocolOptions::default());
    server
        .set_request_handler("initialize", |_request, _ctx| async move {
            Ok(json!({
                "protocolVersion": "2025-06-18",
                "capabilities": {},
                "serverInfo": { "name": "test-server", "version": "1.0" }
            }))
        })
        .unwrap();
    server.connect(Arc::new(transport.clone())).await.unwrap();

    let response = call(&router, post(None, &initialize_body(0))).await;
    assert_eq!(response.headers()["mcp-session-id"], SESSION);
    let reply = SseReader::new(response).next_message().await;
    match reply {
        JsonRpcMessage::Response(response) => {
            assert_eq!(response.result().unwrap()["serverInfo"]["name"], "test-server");
        }
        other => panic!("expected response, got {other:?}"),
    }

    let ping = JsonRpcRequest::new("ping", None, 7);
    let body = serde_json::to_value(&ping).unwrap();
    let mut sse = SseReader::new(call(&router, post(Some(SESSION), &body)).await);
    let reply = sse.next_message().await;
    assert_eq!(reply.response_id(), Some(&RequestId::Number(7)));
    assert!(sse.next_event().await.is_none());
}
