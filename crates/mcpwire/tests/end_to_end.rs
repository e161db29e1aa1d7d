//! Client and server protocol engines talking over real sockets.

use std::sync::Arc;
use std::time::Duration;

use mcpwire::prelude::*;
use mcpwire::server::{bind, serve_with_shutdown};
use mcpwire::wire::ErrorKind;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

const LIST_CHANGED: &str = "notifications/tools/list_changed";
const SLOW_CALL: Duration = Duration::from_secs(8);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mcpwire_transport=debug,mcpwire_http=debug")
        .with_test_writer()
        .try_init();
}

fn settings() -> ServerSettings {
    ServerSettings {
        bind_address: "127.0.0.1:0".to_string(),
        keep_alive_secs: 0,
        ..ServerSettings::default()
    }
}

async fn start_server() -> (Protocol, String, oneshot::Sender<()>) {
    start_server_with(settings()).await
}

async fn start_server_with(settings: ServerSettings) -> (Protocol, String, oneshot::Sender<()>) {
    init_tracing();
    let (transport, listener) = bind(&settings).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = transport.router();

    let server = Protocol::new(PeerRole::Server, ProtocolOptions::default());
    let capabilities = json!({ "tools": { "listChanged": true } });
    server
        .register_capabilities(capabilities.as_object().cloned().unwrap())
        .unwrap();
    server
        .set_request_handler("initialize", |_request, _ctx| async move {
            Ok(json!({
                "protocolVersion": LATEST_PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": true } },
                "serverInfo": { "name": "e2e", "version": "1.0.0" }
            }))
        })
        .unwrap();
    server
        .set_request_handler("tools/list", |_request, _ctx| async move {
            Ok(json!({ "tools": [{ "name": "echo", "inputSchema": { "type": "object" } }] }))
        })
        .unwrap();
    server
        .set_request_handler("tools/call", |_request, _ctx| async move {
            tokio::time::sleep(SLOW_CALL).await;
            Ok(json!({ "content": [] }))
        })
        .unwrap();
    server.connect(Arc::new(transport)).await.unwrap();

    let (stop, stopped) = oneshot::channel();
    tokio::spawn(serve_with_shutdown(listener, router, async move {
        let _ = stopped.await;
    }));
    (server, format!("http://{addr}/mcp"), stop)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_lifecycle_over_http() {
    let (server, url, stop) = start_server().await;

    let config = StreamableHttpClientConfig::parse(&url)
        .unwrap()
        .with_reconnection(
            ReconnectionOptions::new().with_initial_delay(Duration::from_millis(20)),
        );
    let transport = Arc::new(StreamableHttpClientTransport::new(config).unwrap());
    let client = Protocol::new(PeerRole::Client, ProtocolOptions::default());
    let (pushed, mut pushes) = mpsc::unbounded_channel();
    client.set_notification_handler(LIST_CHANGED, move |notification| {
        let pushed = pushed.clone();
        async move {
            let _ = pushed.send(notification.method);
            Ok(())
        }
    });
    client.connect(transport.clone()).await.unwrap();

    let init = client
        .request(
            "initialize",
            Some(json!({
                "protocolVersion": LATEST_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": { "name": "e2e-client", "version": "1.0.0" }
            })),
            RequestOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(init["serverInfo"]["name"], "e2e");
    assert!(transport.session_id().is_some());

    transport.set_protocol_version(LATEST_PROTOCOL_VERSION);
    client
        .notification("notifications/initialized", None, NotificationOptions::new())
        .await
        .unwrap();

    // Pushes sent before the standalone stream attaches are dropped, so keep
    // sending until one arrives.
    let mut delivered = None;
    for _ in 0..50 {
        server
            .notification(LIST_CHANGED, None, NotificationOptions::new())
            .await
            .unwrap();
        let pushed = tokio::time::timeout(Duration::from_millis(100), pushes.recv()).await;
        if let Ok(Some(method)) = pushed {
            delivered = Some(method);
            break;
        }
    }
    assert_eq!(delivered.as_deref(), Some(LIST_CHANGED));

    let tools = client
        .request("tools/list", None, RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(tools["tools"][0]["name"], "echo");

    let pong = client.request("ping", None, RequestOptions::default()).await.unwrap();
    assert_eq!(pong, json!({}));

    transport.terminate_session().await.unwrap();
    assert_eq!(transport.session_id(), None);

    client.close().await.unwrap();
    let _ = stop.send(());
}

#[tokio::test]
async fn test_request_fails_after_server_closes() {
    let (server, url, stop) = start_server().await;

    let config = StreamableHttpClientConfig::parse(&url).unwrap();
    let transport = StreamableHttpClientTransport::new(config).unwrap();
    let client = Protocol::new(PeerRole::Client, ProtocolOptions::default());
    client.connect(Arc::new(transport)).await.unwrap();

    client
        .request(
            "initialize",
            Some(json!({ "protocolVersion": LATEST_PROTOCOL_VERSION, "capabilities": {} })),
            RequestOptions::default(),
        )
        .await
        .unwrap();

    server.close().await.unwrap();
    let result = client
        .request(
            "ping",
            None,
            RequestOptions {
                timeout: Some(Duration::from_secs(2)),
                ..RequestOptions::default()
            },
        )
        .await;
    assert!(result.is_err());

    client.close().await.unwrap();
    let _ = stop.send(());
}

async fn json_mode_client() -> (Protocol, Protocol, oneshot::Sender<()>) {
    let (server, url, stop) = start_server_with(ServerSettings {
        json_response: true,
        ..settings()
    })
    .await;

    let config = StreamableHttpClientConfig::parse(&url).unwrap();
    let transport = StreamableHttpClientTransport::new(config).unwrap();
    let client = Protocol::new(PeerRole::Client, ProtocolOptions::default());
    client.connect(Arc::new(transport)).await.unwrap();
    client
        .request(
            "initialize",
            Some(json!({ "protocolVersion": LATEST_PROTOCOL_VERSION, "capabilities": {} })),
            RequestOptions::default(),
        )
        .await
        .unwrap();
    (server, client, stop)
}

#[tokio::test]
async fn test_timeout_settles_while_json_reply_is_pending() {
    let (_server, client, stop) = json_mode_client().await;

    let call = client.request(
        "tools/call",
        Some(json!({ "name": "echo" })),
        RequestOptions::new().with_timeout(Duration::from_millis(300)),
    );
    let err = tokio::time::timeout(Duration::from_secs(3), call)
        .await
        .expect("request did not settle")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RequestTimeout);
    assert_eq!(client.pending_requests(), 0);

    client.close().await.unwrap();
    let _ = stop.send(());
}

#[tokio::test]
async fn test_cancellation_settles_while_json_reply_is_pending() {
    let (_server, client, stop) = json_mode_client().await;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let call = client.request(
        "tools/call",
        Some(json!({ "name": "echo" })),
        RequestOptions::new().with_cancellation(token),
    );
    let err = tokio::time::timeout(Duration::from_secs(3), call)
        .await
        .expect("request did not settle")
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(client.pending_requests(), 0);

    client.close().await.unwrap();
    let _ = stop.send(());
}
