//! # mcpwire
//!
//! Wire-level plumbing for the [Model Context Protocol](https://modelcontextprotocol.io/):
//! a transport-agnostic JSON-RPC correlation engine and the streamable HTTP
//! transports it runs over.
//!
//! | Crate | Re-exported as | Feature |
//! |-------|----------------|---------|
//! | `mcpwire-core` | [`wire`] | always |
//! | `mcpwire-transport-traits` | [`transport`] | always |
//! | `mcpwire-protocol` | [`protocol`] | always |
//! | `mcpwire-streamable` | [`streamable`] | always |
//! | `mcpwire-transport` | [`server`] | `http-server` |
//! | `mcpwire-http` | [`client`] | `http-client` |
//!
//! ## Serving
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcpwire::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ServerSettings::from_env()?;
//! let (transport, listener) = mcpwire::server::bind(&settings).await?;
//! let router = transport.router();
//!
//! let server = Protocol::new(PeerRole::Server, ProtocolOptions::default());
//! server.set_request_handler("initialize", |_request, _ctx| async move {
//!     Ok(serde_json::json!({
//!         "protocolVersion": LATEST_PROTOCOL_VERSION,
//!         "capabilities": {},
//!         "serverInfo": { "name": "example", "version": "1.0.0" }
//!     }))
//! })?;
//! server.connect(Arc::new(transport)).await?;
//! mcpwire::server::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Connecting
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcpwire::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StreamableHttpClientConfig::parse("http://127.0.0.1:8080/mcp")?;
//! let client = Protocol::new(PeerRole::Client, ProtocolOptions::default());
//! client
//!     .connect(Arc::new(StreamableHttpClientTransport::new(config)?))
//!     .await?;
//! client.request("ping", None, RequestOptions::default()).await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub use mcpwire_core as wire;
pub use mcpwire_protocol as protocol;
pub use mcpwire_streamable as streamable;
pub use mcpwire_transport_traits as transport;

#[cfg(feature = "http-server")]
pub use mcpwire_transport as server;

#[cfg(feature = "http-client")]
pub use mcpwire_http as client;

pub use mcpwire_core::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, LATEST_PROTOCOL_VERSION,
    McpError, McpResult, PeerRole, RequestId,
};
pub use mcpwire_protocol::{
    NotificationOptions, Protocol, ProtocolOptions, RequestContext, RequestOptions,
};
pub use mcpwire_transport_traits::{Transport, TransportError, TransportEvent, TransportSendOptions};

#[cfg(feature = "http-server")]
pub use mcpwire_transport::{
    ServerSettings, StreamableHttpServerConfig, StreamableHttpServerTransport,
};

#[cfg(feature = "http-client")]
pub use mcpwire_http::{
    Authenticator, ReconnectionOptions, StreamableHttpClientConfig, StreamableHttpClientTransport,
};

/// Everything needed to wire a peer to a transport
pub mod prelude {
    pub use crate::{
        JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, LATEST_PROTOCOL_VERSION, McpError,
        McpResult, NotificationOptions, PeerRole, Protocol, ProtocolOptions, RequestContext,
        RequestId, RequestOptions, Transport,
    };

    #[cfg(feature = "http-server")]
    pub use crate::{ServerSettings, StreamableHttpServerConfig, StreamableHttpServerTransport};

    #[cfg(feature = "http-client")]
    pub use crate::{ReconnectionOptions, StreamableHttpClientConfig, StreamableHttpClientTransport};
}
