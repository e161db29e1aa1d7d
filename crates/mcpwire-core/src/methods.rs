//! Well-known MCP method names.
//!
//! Dispatch tables stay keyed by string so applications can register custom
//! methods; [`McpMethod`] is the closed set the capability rules are written
//! against.

use std::fmt;
use std::str::FromStr;

/// `initialize`
pub const INITIALIZE: &str = "initialize";
/// `ping`
pub const PING: &str = "ping";
/// `notifications/initialized`
pub const INITIALIZED: &str = "notifications/initialized";
/// `notifications/cancelled`
pub const CANCELLED: &str = "notifications/cancelled";
/// `notifications/progress`
pub const PROGRESS: &str = "notifications/progress";

macro_rules! mcp_methods {
    ($( $(#[$doc:meta])* $variant:ident => $name:literal ),+ $(,)?) => {
        /// Closed set of MCP protocol methods.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        pub enum McpMethod {
            $( $(#[$doc])* $variant, )+
        }

        impl McpMethod {
            /// Wire name of the method
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )+
                }
            }
        }

        impl FromStr for McpMethod {
            type Err = UnknownMethod;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $name => Ok(Self::$variant), )+
                    other => Err(UnknownMethod(other.to_string())),
                }
            }
        }
    };
}

mcp_methods! {
    /// `initialize`
    Initialize => "initialize",
    /// `ping`
    Ping => "ping",
    /// `completion/complete`
    CompletionComplete => "completion/complete",
    /// `logging/setLevel`
    LoggingSetLevel => "logging/setLevel",
    /// `prompts/get`
    PromptsGet => "prompts/get",
    /// `prompts/list`
    PromptsList => "prompts/list",
    /// `resources/list`
    ResourcesList => "resources/list",
    /// `resources/templates/list`
    ResourcesTemplatesList => "resources/templates/list",
    /// `resources/read`
    ResourcesRead => "resources/read",
    /// `resources/subscribe`
    ResourcesSubscribe => "resources/subscribe",
    /// `resources/unsubscribe`
    ResourcesUnsubscribe => "resources/unsubscribe",
    /// `tools/call`
    ToolsCall => "tools/call",
    /// `tools/list`
    ToolsList => "tools/list",
    /// `sampling/createMessage`
    SamplingCreateMessage => "sampling/createMessage",
    /// `elicitation/create`
    ElicitationCreate => "elicitation/create",
    /// `roots/list`
    RootsList => "roots/list",
    /// `notifications/initialized`
    NotificationsInitialized => "notifications/initialized",
    /// `notifications/cancelled`
    NotificationsCancelled => "notifications/cancelled",
    /// `notifications/progress`
    NotificationsProgress => "notifications/progress",
    /// `notifications/message`
    NotificationsMessage => "notifications/message",
    /// `notifications/resources/updated`
    NotificationsResourcesUpdated => "notifications/resources/updated",
    /// `notifications/resources/list_changed`
    NotificationsResourcesListChanged => "notifications/resources/list_changed",
    /// `notifications/tools/list_changed`
    NotificationsToolsListChanged => "notifications/tools/list_changed",
    /// `notifications/prompts/list_changed`
    NotificationsPromptsListChanged => "notifications/prompts/list_changed",
    /// `notifications/roots/list_changed`
    NotificationsRootsListChanged => "notifications/roots/list_changed",
}

impl fmt::Display for McpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method string outside the known MCP set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMethod(pub String);

impl fmt::Display for UnknownMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown MCP method: {}", self.0)
    }
}

impl std::error::Error for UnknownMethod {}

/// Which side of the connection a peer plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    /// Initiates the connection and the `initialize` handshake
    Client,
    /// Answers `initialize` and serves features
    Server,
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => f.write_str("client"),
            Self::Server => f.write_str("server"),
        }
    }
}
