//! # mcpwire protocol
//!
//! The request/response correlation engine shared by MCP clients and servers.
//!
//! ```text
//! Protocol::request()
//!     1. allocate id, register oneshot + timer
//!     2. Transport::send
//!     3. await outcome (response | error | timeout | cancel | close)
//!
//! dispatcher task (sole consumer of Transport::start() events)
//!     Response     -> pending oneshot
//!     Request      -> spawned handler -> reply
//!     Notification -> cancel / progress built-ins, else handler
//! ```
//!
//! ```rust
//! use std::sync::Arc;
//! use mcpwire_core::PeerRole;
//! use mcpwire_protocol::{Protocol, ProtocolOptions, RequestOptions};
//! use mcpwire_transport_traits::ChannelTransport;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> mcpwire_core::McpResult<()> {
//! let (left, right) = ChannelTransport::pair();
//! let client = Protocol::new(PeerRole::Client, ProtocolOptions::default());
//! let server = Protocol::new(PeerRole::Server, ProtocolOptions::default());
//! client.connect(Arc::new(left)).await?;
//! server.connect(Arc::new(right)).await?;
//!
//! let pong = client.request("ping", None, RequestOptions::default()).await?;
//! assert_eq!(pong, serde_json::json!({}));
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

mod capability;
mod context;
mod handler;
mod options;
mod protocol;

pub use context::RequestContext;
pub use handler::{CloseCallback, ErrorCallback, NotificationHandler, RequestHandler};
pub use options::{
    DEFAULT_REQUEST_TIMEOUT, NotificationOptions, ProgressCallback, ProtocolOptions,
    RequestOptions,
};
pub use protocol::Protocol;
