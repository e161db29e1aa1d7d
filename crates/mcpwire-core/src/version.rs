//! Protocol version constants.

/// Newest protocol revision this crate speaks
pub const LATEST_PROTOCOL_VERSION: &str = "2025-11-25";

/// Version assumed when a peer omits the `Mcp-Protocol-Version` header
pub const DEFAULT_NEGOTIATED_PROTOCOL_VERSION: &str = "2025-03-26";

/// Every protocol revision accepted on the wire, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] =
    &["2025-11-25", "2025-06-18", "2025-03-26", "2024-11-05"];

/// Whether `version` is one of [`SUPPORTED_PROTOCOL_VERSIONS`]
pub fn is_supported_protocol_version(version: &str) -> bool {
    SUPPORTED_PROTOCOL_VERSIONS.contains(&version)
}
