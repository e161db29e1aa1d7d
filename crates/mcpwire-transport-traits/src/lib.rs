//! # mcpwire transport traits
//!
//! The seam between the protocol engine and the wire. This crate defines:
//! - **Trait**: [`Transport`], with boxed futures so it stays object safe
//! - **Events**: [`TransportEvent`], [`MessageExtra`], [`TransportEventEmitter`]
//! - **Errors**: [`TransportError`], [`TransportResult`]
//! - **Options**: [`TransportSendOptions`]
//! - **Testing**: [`ChannelTransport`], a linked in-process pair
//!
//! ```rust
//! use mcpwire_transport_traits::{ChannelTransport, Transport, TransportEvent, TransportSendOptions};
//! use mcpwire_core::JsonRpcNotification;
//!
//! # tokio_test::block_on(async {
//! let (client, server) = ChannelTransport::pair();
//! let mut inbound = server.start().await?;
//! client
//!     .send(JsonRpcNotification::new("notifications/initialized", None).into(), TransportSendOptions::new())
//!     .await?;
//! assert!(matches!(inbound.recv().await, Some(TransportEvent::Message { .. })));
//! # Ok::<_, mcpwire_transport_traits::TransportError>(())
//! # });
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

mod channel;
mod error;
mod events;
mod traits;

pub use channel::ChannelTransport;
pub use error::{TransportError, TransportResult};
pub use events::{MessageExtra, TransportEvent, TransportEventEmitter, TransportEvents};
pub use traits::{ResumptionTokenCallback, Transport, TransportSendOptions};
