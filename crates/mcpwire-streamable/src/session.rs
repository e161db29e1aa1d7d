//! Session identifiers.
//!
//! A session id is minted once per server transport when the initialize
//! request arrives and echoed by the client on every later request.

use std::sync::Arc;

use uuid::Uuid;

/// Upper bound on accepted session id length
pub const MAX_SESSION_ID_LEN: usize = 256;

/// Produces a fresh session id. Supplying none makes a server stateless.
pub type SessionIdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// A random UUID v4 session id
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// The default generator, backed by [`generate_session_id`]
pub fn uuid_session_id_generator() -> SessionIdGenerator {
    Arc::new(generate_session_id)
}

/// Session ids must be non-empty visible ASCII (0x21..=0x7E) and bounded in length.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id.bytes().all(|b| (0x21..=0x7E).contains(&b))
}
