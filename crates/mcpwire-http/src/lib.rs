//! # mcpwire HTTP client
//!
//! Streamable HTTP client transport built on reqwest.
//!
//! - [`StreamableHttpClientTransport`]: POSTs every message and reads JSON or
//!   SSE replies, keeps the standalone push stream open, and resumes dropped
//!   streams with `Last-Event-ID`
//! - [`ReconnectionOptions`]: exponential backoff for stream reconnection
//! - [`Authenticator`]: bearer tokens and the 401 retry cycle

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

pub mod auth;
mod config;
mod reconnect;
mod transport;

pub use auth::{
    AuthError, Authenticator, CredentialScope, StaticTokenAuthenticator, UnauthorizedContext,
};
pub use config::StreamableHttpClientConfig;
pub use reconnect::ReconnectionOptions;
pub use transport::StreamableHttpClientTransport;
