//! # mcpwire streamable
//!
//! IO-free building blocks shared by the streamable HTTP server and client:
//!
//! - **SSE**: [`SseEncoder`] and the incremental [`SseParser`]
//! - **Sessions**: id generation and validation
//! - **Resumability**: the [`EventStore`] trait and [`InMemoryEventStore`]
//!
//! ```rust
//! use mcpwire_streamable::{SseEncoder, SseEvent, SseParser};
//!
//! let frame = SseEncoder::encode(&SseEvent::new(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).with_id("s_1"));
//! let events = SseParser::new().feed(frame.as_bytes());
//! assert_eq!(events[0].id.as_deref(), Some("s_1"));
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

pub mod event_store;
pub mod session;
pub mod sse;

pub use event_store::{
    EventId, EventStore, EventStoreError, InMemoryEventStore, ReplaySink, StreamId,
};
pub use session::{
    MAX_SESSION_ID_LEN, SessionIdGenerator, generate_session_id, is_valid_session_id,
    uuid_session_id_generator,
};
pub use sse::{MESSAGE_EVENT, SseEncoder, SseEvent, SseParser};

/// Stream id of the standalone GET push stream
pub const STANDALONE_STREAM_ID: &str = "_GET_stream";

/// Streamable HTTP header names and media types
pub mod headers {
    /// Session id header
    pub const MCP_SESSION_ID: &str = "Mcp-Session-Id";

    /// Negotiated protocol version header
    pub const MCP_PROTOCOL_VERSION: &str = "Mcp-Protocol-Version";

    /// SSE resumption header
    pub const LAST_EVENT_ID: &str = "Last-Event-ID";

    /// JSON media type
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// SSE media type
    pub const CONTENT_TYPE_SSE: &str = "text/event-stream";

    /// `Accept` value clients send on POST
    pub const ACCEPT_POST: &str = "application/json, text/event-stream";

    /// Whether an `Accept` or `Content-Type` value lists `media_type`.
    pub fn lists_media_type(header: &str, media_type: &str) -> bool {
        header.split(',').any(|part| {
            part.split(';')
                .next()
                .is_some_and(|m| m.trim().eq_ignore_ascii_case(media_type))
        })
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_lists_media_type() {
            assert!(lists_media_type(ACCEPT_POST, CONTENT_TYPE_JSON));
            assert!(lists_media_type(ACCEPT_POST, CONTENT_TYPE_SSE));
            assert!(lists_media_type(
                "application/json; charset=utf-8",
                CONTENT_TYPE_JSON
            ));
            assert!(!lists_media_type("text/html", CONTENT_TYPE_JSON));
        }
    }
}
