//! Capability rules per peer role.

use mcpwire_core::{Capabilities, McpError, McpMethod, McpResult, PeerRole};

/// Remote capability an outbound request needs. `None` means unchecked.
fn required_remote(role: PeerRole, method: McpMethod) -> Option<&'static str> {
    use McpMethod as M;
    match (role, method) {
        (PeerRole::Client, M::LoggingSetLevel) => Some("logging"),
        (PeerRole::Client, M::PromptsGet | M::PromptsList) => Some("prompts"),
        (
            PeerRole::Client,
            M::ResourcesList
            | M::ResourcesTemplatesList
            | M::ResourcesRead
            | M::ResourcesUnsubscribe,
        ) => Some("resources"),
        (PeerRole::Client, M::ResourcesSubscribe) => Some("resources.subscribe"),
        (PeerRole::Client, M::ToolsCall | M::ToolsList) => Some("tools"),
        (PeerRole::Client, M::CompletionComplete) => Some("completions"),
        (PeerRole::Server, M::SamplingCreateMessage) => Some("sampling"),
        (PeerRole::Server, M::ElicitationCreate) => Some("elicitation"),
        (PeerRole::Server, M::RootsList) => Some("roots"),
        _ => None,
    }
}

/// Local capability a notification needs. The outer `None` means the role
/// may not emit it at all.
fn required_for_notification(role: PeerRole, method: McpMethod) -> Option<Option<&'static str>> {
    use McpMethod as M;
    match (role, method) {
        (_, M::NotificationsCancelled | M::NotificationsProgress) => Some(None),
        (PeerRole::Client, M::NotificationsInitialized) => Some(None),
        (PeerRole::Client, M::NotificationsRootsListChanged) => Some(Some("roots.listChanged")),
        (PeerRole::Server, M::NotificationsMessage) => Some(Some("logging")),
        (
            PeerRole::Server,
            M::NotificationsResourcesUpdated | M::NotificationsResourcesListChanged,
        ) => Some(Some("resources")),
        (PeerRole::Server, M::NotificationsToolsListChanged) => Some(Some("tools")),
        (PeerRole::Server, M::NotificationsPromptsListChanged) => Some(Some("prompts")),
        _ => None,
    }
}

/// Local capability needed to serve a request method. `None` means allowed.
fn required_for_handler(role: PeerRole, method: McpMethod) -> Option<&'static str> {
    use McpMethod as M;
    match (role, method) {
        (PeerRole::Client, M::SamplingCreateMessage) => Some("sampling"),
        (PeerRole::Client, M::ElicitationCreate) => Some("elicitation"),
        (PeerRole::Client, M::RootsList) => Some("roots"),
        (PeerRole::Server, M::CompletionComplete) => Some("completions"),
        (PeerRole::Server, M::LoggingSetLevel) => Some("logging"),
        (PeerRole::Server, M::PromptsGet | M::PromptsList) => Some("prompts"),
        (
            PeerRole::Server,
            M::ResourcesList
            | M::ResourcesTemplatesList
            | M::ResourcesRead
            | M::ResourcesSubscribe
            | M::ResourcesUnsubscribe,
        ) => Some("resources"),
        (PeerRole::Server, M::ToolsCall | M::ToolsList) => Some("tools"),
        _ => None,
    }
}

fn peer(role: PeerRole) -> PeerRole {
    match role {
        PeerRole::Client => PeerRole::Server,
        PeerRole::Server => PeerRole::Client,
    }
}

/// Check that the remote peer advertised what `method` needs.
pub(crate) fn assert_capability_for_method(
    role: PeerRole,
    method: &str,
    remote: &Capabilities,
) -> McpResult<()> {
    let Ok(known) = method.parse::<McpMethod>() else {
        return Ok(());
    };
    match required_remote(role, known) {
        Some(capability) if !remote.supports(capability) => {
            Err(McpError::capability_not_supported(format!(
                "{} does not support {capability} (required for {method})",
                capitalize(peer(role))
            )))
        }
        _ => Ok(()),
    }
}

/// Check that this peer may emit `method`.
pub(crate) fn assert_notification_capability(
    role: PeerRole,
    method: &str,
    local: &Capabilities,
) -> McpResult<()> {
    let requirement = method
        .parse::<McpMethod>()
        .ok()
        .and_then(|known| required_for_notification(role, known));
    match requirement {
        None => Err(McpError::capability_not_supported(format!(
            "{} cannot send notification {method}",
            capitalize(role)
        ))),
        Some(Some(capability)) if !local.supports(capability) => {
            Err(McpError::capability_not_supported(format!(
                "{} does not support {capability} (required for {method})",
                capitalize(role)
            )))
        }
        Some(_) => Ok(()),
    }
}

/// Check that this peer declared what serving `method` implies.
pub(crate) fn assert_request_handler_capability(
    role: PeerRole,
    method: &str,
    local: &Capabilities,
) -> McpResult<()> {
    let Ok(known) = method.parse::<McpMethod>() else {
        return Ok(());
    };
    match required_for_handler(role, known) {
        Some(capability) if !local.supports(capability) => {
            Err(McpError::capability_not_supported(format!(
                "{} does not support {capability} (required for {method})",
                capitalize(role)
            )))
        }
        _ => Ok(()),
    }
}

fn capitalize(role: PeerRole) -> &'static str {
    match role {
        PeerRole::Client => "Client",
        PeerRole::Server => "Server",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpwire_core::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_client_remote_requirements() {
        let remote = Capabilities::new().with("resources", json!({}));
        assert!(assert_capability_for_method(PeerRole::Client, "resources/read", &remote).is_ok());

        let err =
            assert_capability_for_method(PeerRole::Client, "resources/subscribe", &remote)
                .unwrap_err();
        assert_eq!(err.kind, ErrorKind::CapabilityNotSupported);
        assert!(err.message.contains("resources.subscribe"));

        assert!(assert_capability_for_method(PeerRole::Client, "tools/call", &remote).is_err());
        assert!(assert_capability_for_method(PeerRole::Client, "ping", &remote).is_ok());
        assert!(assert_capability_for_method(PeerRole::Client, "custom/thing", &remote).is_ok());
    }

    #[test]
    fn test_server_remote_requirements() {
        let remote = Capabilities::new().with("sampling", json!({}));
        assert!(
            assert_capability_for_method(PeerRole::Server, "sampling/createMessage", &remote)
                .is_ok()
        );
        assert!(assert_capability_for_method(PeerRole::Server, "roots/list", &remote).is_err());
        // servers never call tools on clients; unchecked
        assert!(assert_capability_for_method(PeerRole::Server, "tools/call", &remote).is_ok());
    }

    #[test]
    fn test_notification_list_is_closed() {
        let none = Capabilities::new();
        assert!(
            assert_notification_capability(PeerRole::Client, "notifications/initialized", &none)
                .is_ok()
        );
        assert!(
            assert_notification_capability(PeerRole::Server, "notifications/initialized", &none)
                .is_err()
        );
        assert!(
            assert_notification_capability(PeerRole::Server, "notifications/custom", &none)
                .is_err()
        );
        assert!(
            assert_notification_capability(PeerRole::Server, "notifications/message", &none)
                .is_err()
        );

        let logging = Capabilities::new().with("logging", json!({}));
        assert!(
            assert_notification_capability(PeerRole::Server, "notifications/message", &logging)
                .is_ok()
        );
    }

    #[test]
    fn test_roots_list_changed_needs_flag() {
        let roots = Capabilities::new().with("roots", json!({}));
        assert!(
            assert_notification_capability(
                PeerRole::Client,
                "notifications/roots/list_changed",
                &roots
            )
            .is_err()
        );
        let roots = Capabilities::new().with("roots", json!({ "listChanged": true }));
        assert!(
            assert_notification_capability(
                PeerRole::Client,
                "notifications/roots/list_changed",
                &roots
            )
            .is_ok()
        );
    }

    #[test]
    fn test_handler_requirements() {
        let none = Capabilities::new();
        assert!(assert_request_handler_capability(PeerRole::Server, "tools/call", &none).is_err());
        assert!(assert_request_handler_capability(PeerRole::Server, "custom/op", &none).is_ok());
        assert!(
            assert_request_handler_capability(PeerRole::Client, "sampling/createMessage", &none)
                .is_err()
        );

        let tools = Capabilities::new().with("tools", json!({}));
        assert!(assert_request_handler_capability(PeerRole::Server, "tools/list", &tools).is_ok());
    }
}
