//! # mcpwire transport
//!
//! Streamable HTTP server transport built on axum.
//!
//! - [`StreamableHttpServerTransport`]: the [`Transport`](mcpwire_transport_traits::Transport)
//!   implementation and its axum [`Router`](axum::Router)
//! - [`StreamableHttpServerConfig`]: sessions, JSON response mode, resumability, keep-alive
//! - [`ServerSettings`]: file and environment configuration
//! - [`serve`], [`serve_with_shutdown`], [`bind`]: running the router

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

pub mod config;
mod server;
mod streamable_http;

pub use config::{
    ConfigError, DEFAULT_ENDPOINT_PATH, DEFAULT_KEEP_ALIVE, DEFAULT_REPLAY_BUFFER_SIZE,
    ENV_PREFIX, ServerSettings, SessionCallback, StreamableHttpServerConfig,
};
pub use server::{bind, serve, serve_with_shutdown};
pub use streamable_http::StreamableHttpServerTransport;
