//! # mcpwire core
//!
//! Wire-level building blocks shared by every mcpwire crate:
//!
//! - [`jsonrpc`]: JSON-RPC 2.0 envelopes, request ids and batches
//! - [`error`]: the unified [`McpError`] and its code table
//! - [`capabilities`]: capability maps checked by the protocol engine
//! - [`methods`]: well-known method names and [`PeerRole`]
//! - [`version`]: supported protocol revisions
//! - [`types`]: payloads of the progress and cancellation notifications
//!
//! This crate does no IO.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod capabilities;
pub mod error;
pub mod jsonrpc;
pub mod methods;
pub mod types;
pub mod version;

pub use capabilities::{
    Capabilities, ClientCapabilities, FeatureFlag, ListChangedCapabilities, ResourcesCapabilities,
    RootsCapabilities, ServerCapabilities,
};
pub use error::{ErrorContext, ErrorKind, McpError, McpResult};
pub use jsonrpc::{
    JsonRpcBatch, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, JsonRpcResponsePayload, RequestId, ResponseId,
};
pub use methods::{McpMethod, PeerRole};
pub use types::{CancelledNotificationParams, Progress, ProgressNotificationParams, ProgressToken};
pub use version::{
    DEFAULT_NEGOTIATED_PROTOCOL_VERSION, LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
