//! Client transport configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::auth::Authenticator;
use crate::reconnect::ReconnectionOptions;

/// Streamable HTTP client configuration
#[derive(Clone)]
pub struct StreamableHttpClientConfig {
    /// MCP endpoint URL
    pub url: Url,
    /// Backoff for SSE stream reconnection
    pub reconnection: ReconnectionOptions,
    /// Session to resume instead of starting a new one
    pub session_id: Option<String>,
    /// Token source and 401 handler
    pub authenticator: Option<Arc<dyn Authenticator>>,
    /// Extra headers sent on every request
    pub headers: HashMap<String, String>,
    /// Connect timeout, and total timeout of DELETE requests.
    ///
    /// POST and GET responses may be long-lived SSE streams, so they are not
    /// bounded as a whole.
    pub timeout: Duration,
    /// User-Agent header; `None` sends none
    pub user_agent: Option<String>,
}

impl StreamableHttpClientConfig {
    /// Defaults for `url`
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnection: ReconnectionOptions::default(),
            session_id: None,
            authenticator: None,
            headers: HashMap::new(),
            timeout: Duration::from_secs(30),
            user_agent: Some(format!("mcpwire/{}", env!("CARGO_PKG_VERSION"))),
        }
    }

    /// Parse `url` and use defaults for everything else
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    /// Set the reconnection backoff
    #[must_use]
    pub fn with_reconnection(mut self, reconnection: ReconnectionOptions) -> Self {
        self.reconnection = reconnection;
        self
    }

    /// Resume `session_id`
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Authenticate with `authenticator`
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Add a header to every request
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set or clear the User-Agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }
}

impl fmt::Debug for StreamableHttpClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamableHttpClientConfig")
            .field("url", &self.url.as_str())
            .field("reconnection", &self.reconnection)
            .field("session_id", &self.session_id)
            .field("authenticator", &self.authenticator)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
