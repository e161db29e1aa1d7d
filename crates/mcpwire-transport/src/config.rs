//! Server transport configuration.
//!
//! [`StreamableHttpServerConfig`] is the programmatic builder the transport is
//! constructed from. [`ServerSettings`] is its serializable subset, loaded from
//! a TOML/YAML/JSON file with `MCPWIRE_*` environment overrides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use mcpwire_core::SUPPORTED_PROTOCOL_VERSIONS;
use mcpwire_streamable::{
    EventStore, InMemoryEventStore, SessionIdGenerator, uuid_session_id_generator,
};
use serde::{Deserialize, Serialize};

/// Default MCP endpoint path
pub const DEFAULT_ENDPOINT_PATH: &str = "/mcp";

/// Environment variable prefix for [`ServerSettings`]
pub const ENV_PREFIX: &str = "MCPWIRE";

/// Default SSE keep-alive interval
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Default number of events retained for resumption
pub const DEFAULT_REPLAY_BUFFER_SIZE: usize = 1000;

/// Hook receiving a session id
pub type SessionCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Configuration for [`StreamableHttpServerTransport`](crate::StreamableHttpServerTransport).
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use mcpwire_streamable::InMemoryEventStore;
/// use mcpwire_transport::StreamableHttpServerConfig;
///
/// let config = StreamableHttpServerConfig::new()
///     .with_endpoint_path("/api/mcp")
///     .with_event_store(Arc::new(InMemoryEventStore::new().with_max_events(500)))
///     .with_keep_alive(Duration::from_secs(15))
///     .with_on_session_initialized(|id| println!("session {id} opened"));
/// assert!(config.is_stateful());
/// ```
#[derive(Clone)]
pub struct StreamableHttpServerConfig {
    /// Mints session ids; `None` runs the transport stateless
    pub session_id_generator: Option<SessionIdGenerator>,
    /// Called after a session id is minted
    pub on_session_initialized: Option<SessionCallback>,
    /// Called when a client terminates its session with DELETE
    pub on_session_closed: Option<SessionCallback>,
    /// Answer POSTs with a JSON body instead of an SSE stream
    pub enable_json_response: bool,
    /// Enables resumable delivery
    pub event_store: Option<Arc<dyn EventStore>>,
    /// Interval of SSE keep-alive comments
    pub keep_alive: Option<Duration>,
    /// Path the router serves
    pub endpoint_path: String,
    /// Accepted `Mcp-Protocol-Version` values
    pub supported_protocol_versions: Vec<String>,
}

impl Default for StreamableHttpServerConfig {
    fn default() -> Self {
        Self {
            session_id_generator: Some(uuid_session_id_generator()),
            on_session_initialized: None,
            on_session_closed: None,
            enable_json_response: false,
            event_store: None,
            keep_alive: Some(DEFAULT_KEEP_ALIVE),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            supported_protocol_versions: SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl StreamableHttpServerConfig {
    /// Stateful defaults: UUID session ids, SSE responses, 30s keep-alive
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether sessions are tracked
    pub fn is_stateful(&self) -> bool {
        self.session_id_generator.is_some()
    }

    /// Disable session tracking
    #[must_use]
    pub fn stateless(mut self) -> Self {
        self.session_id_generator = None;
        self
    }

    /// Mint session ids with `generator`
    #[must_use]
    pub fn with_session_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.session_id_generator = Some(Arc::new(generator));
        self
    }

    /// Observe session creation
    #[must_use]
    pub fn with_on_session_initialized<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_session_initialized = Some(Arc::new(callback));
        self
    }

    /// Observe session termination
    #[must_use]
    pub fn with_on_session_closed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_session_closed = Some(Arc::new(callback));
        self
    }

    /// Answer POSTs with plain JSON
    #[must_use]
    pub fn with_json_response(mut self, enabled: bool) -> Self {
        self.enable_json_response = enabled;
        self
    }

    /// Store SSE events for replay
    #[must_use]
    pub fn with_event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.event_store = Some(store);
        self
    }

    /// Keep-alive comment interval
    #[must_use]
    pub fn with_keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = Some(interval);
        self
    }

    /// No keep-alive comments
    #[must_use]
    pub fn without_keep_alive(mut self) -> Self {
        self.keep_alive = None;
        self
    }

    /// Serve on `path` instead of `/mcp`
    #[must_use]
    pub fn with_endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    /// Replace the accepted protocol versions
    #[must_use]
    pub fn with_supported_protocol_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_protocol_versions = versions.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for StreamableHttpServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamableHttpServerConfig")
            .field("stateful", &self.is_stateful())
            .field("enable_json_response", &self.enable_json_response)
            .field("event_store", &self.event_store)
            .field("keep_alive", &self.keep_alive)
            .field("endpoint_path", &self.endpoint_path)
            .field("supported_protocol_versions", &self.supported_protocol_versions)
            .finish_non_exhaustive()
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unsupported file format
    #[error("Unsupported configuration file format. Use .toml, .yaml, .yml, or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Values parsed but make no sense together
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The bind address could not be bound
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Configured address
        address: String,
        /// Underlying socket error
        source: std::io::Error,
    },
}

/// Deployment settings for an HTTP server.
///
/// Every field has a default, so a file only needs the keys it changes.
/// Environment variables override the file: `MCPWIRE_BIND_ADDRESS`,
/// `MCPWIRE_JSON_RESPONSE`, `MCPWIRE_KEEP_ALIVE_SECS`, and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to bind
    pub bind_address: String,
    /// Path the MCP endpoint is served on
    pub endpoint_path: String,
    /// Run without sessions
    pub stateless: bool,
    /// Answer POSTs with JSON bodies
    pub json_response: bool,
    /// SSE keep-alive interval in seconds; 0 disables keep-alive
    pub keep_alive_secs: u64,
    /// Events retained for resumption; 0 disables resumability
    pub replay_buffer_size: usize,
    /// Accepted protocol versions
    pub supported_protocol_versions: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            stateless: false,
            json_response: false,
            keep_alive_secs: DEFAULT_KEEP_ALIVE.as_secs(),
            replay_buffer_size: DEFAULT_REPLAY_BUFFER_SIZE,
            supported_protocol_versions: SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl ServerSettings {
    /// Load settings from a file (TOML, YAML, or JSON), with `MCPWIRE_*`
    /// environment variables overriding file values.
    ///
    /// ```rust,no_run
    /// use mcpwire_transport::ServerSettings;
    ///
    /// let settings = ServerSettings::from_file("mcpwire.toml")?;
    /// # Ok::<(), mcpwire_transport::ConfigError>(())
    /// ```
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Like [`from_file`](Self::from_file) with a custom environment prefix
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };
        let name = path.to_str().ok_or(ConfigError::UnsupportedFormat)?;

        Self::load(
            Config::builder().add_source(File::new(name, format)),
            env_prefix,
        )
    }

    /// Defaults overridden by `MCPWIRE_*` environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(config::Config::builder(), ENV_PREFIX)
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        let settings: Self = builder
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("supported_protocol_versions")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check values the type system cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "endpoint_path must start with '/': {}",
                self.endpoint_path
            )));
        }
        if self.supported_protocol_versions.is_empty() {
            return Err(ConfigError::Invalid(
                "supported_protocol_versions must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Builder pre-filled from these settings; hooks can be added on top
    pub fn to_server_config(&self) -> StreamableHttpServerConfig {
        let mut config = StreamableHttpServerConfig::new()
            .with_endpoint_path(self.endpoint_path.clone())
            .with_json_response(self.json_response)
            .with_supported_protocol_versions(self.supported_protocol_versions.clone());
        if self.stateless {
            config = config.stateless();
        }
        config = match self.keep_alive_secs {
            0 => config.without_keep_alive(),
            secs => config.with_keep_alive(Duration::from_secs(secs)),
        };
        if self.replay_buffer_size > 0 {
            config = config.with_event_store(Arc::new(
                InMemoryEventStore::new().with_max_events(self.replay_buffer_size),
            ));
        }
        config
    }
}

impl From<&ServerSettings> for StreamableHttpServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        settings.to_server_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_stateful_sse() {
        let config = StreamableHttpServerConfig::default();
        assert!(config.is_stateful());
        assert!(!config.enable_json_response);
        assert_eq!(config.endpoint_path, "/mcp");
        assert_eq!(config.keep_alive, Some(Duration::from_secs(30)));
        assert!(
            config
                .supported_protocol_versions
                .contains(&"2025-03-26".to_string())
        );
    }

    #[test]
    fn test_toml_overrides_selected_keys() {
        let file = write_file(
            ".toml",
            r#"
bind_address = "0.0.0.0:9000"
json_response = true
keep_alive_secs = 0
replay_buffer_size = 0
"#,
        );
        let settings =
            ServerSettings::from_file_with_prefix(file.path(), "MCPWIRE_TEST_TOML").unwrap();
        assert_eq!(settings.bind_address, "0.0.0.0:9000");
        assert_eq!(settings.endpoint_path, "/mcp");

        let config = settings.to_server_config();
        assert!(config.enable_json_response);
        assert_eq!(config.keep_alive, None);
        assert!(config.event_store.is_none());
    }

    #[test]
    fn test_json_settings() {
        let file = write_file(
            ".json",
            r#"{
                "endpoint_path": "/rpc",
                "stateless": true,
                "supported_protocol_versions": ["2025-06-18"]
            }"#,
        );
        let settings =
            ServerSettings::from_file_with_prefix(file.path(), "MCPWIRE_TEST_JSON").unwrap();
        let config = StreamableHttpServerConfig::from(&settings);
        assert!(!config.is_stateful());
        assert_eq!(config.endpoint_path, "/rpc");
        assert_eq!(config.supported_protocol_versions, vec!["2025-06-18"]);
        assert!(config.event_store.is_some());
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let file = write_file(".yaml", "endpoint_path: mcp\n");
        let err =
            ServerSettings::from_file_with_prefix(file.path(), "MCPWIRE_TEST_YAML").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        assert!(matches!(
            ServerSettings::from_file("/definitely/not/here.toml"),
            Err(ConfigError::FileNotFound(_))
        ));
        let file = write_file(".ini", "x=1\n");
        assert!(matches!(
            ServerSettings::from_file(file.path()),
            Err(ConfigError::UnsupportedFormat)
        ));
    }
}
