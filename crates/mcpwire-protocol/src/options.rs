//! Engine and per-call options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mcpwire_core::{Progress, RequestId};
use mcpwire_transport_traits::ResumptionTokenCallback;
use tokio_util::sync::CancellationToken;

/// Default time to wait for a response
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Called for every progress notification tied to a request
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Engine-wide settings.
#[derive(Debug, Clone)]
pub struct ProtocolOptions {
    /// Check outbound requests against the remote peer's capabilities
    pub enforce_strict_capabilities: bool,
    /// Parameterless notifications coalesced to one send per scheduler tick
    pub debounced_notification_methods: Vec<String>,
    /// Timeout for requests that do not set their own
    pub default_request_timeout: Duration,
}

impl Default for ProtocolOptions {
    fn default() -> Self {
        Self {
            enforce_strict_capabilities: false,
            debounced_notification_methods: Vec::new(),
            default_request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ProtocolOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable remote capability checks on outbound requests
    #[must_use]
    pub fn with_strict_capabilities(mut self, strict: bool) -> Self {
        self.enforce_strict_capabilities = strict;
        self
    }

    /// Debounce `method`
    #[must_use]
    pub fn with_debounced_notification(mut self, method: impl Into<String>) -> Self {
        self.debounced_notification_methods.push(method.into());
        self
    }

    /// Set the fallback request timeout
    #[must_use]
    pub fn with_default_request_timeout(mut self, timeout: Duration) -> Self {
        self.default_request_timeout = timeout;
        self
    }
}

/// Options for one outbound request.
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// Interval timeout; the engine default applies when unset
    pub timeout: Option<Duration>,
    /// Restart the interval timeout whenever progress arrives
    pub reset_timeout_on_progress: bool,
    /// Hard ceiling on total wait, regardless of progress
    pub max_total_timeout: Option<Duration>,
    /// Progress observer; setting it embeds a progress token in the request
    pub on_progress: Option<ProgressCallback>,
    /// Local cancellation
    pub cancellation: Option<CancellationToken>,
    /// Reason reported when `cancellation` fires
    pub cancel_reason: Option<String>,
    /// Inbound request this one is issued on behalf of
    pub related_request_id: Option<RequestId>,
    /// Resume an interrupted response stream
    pub resumption_token: Option<String>,
    /// Observe resumption tokens
    pub on_resumption_token: Option<ResumptionTokenCallback>,
}

impl RequestOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the interval timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Restart the timeout on progress
    #[must_use]
    pub fn with_reset_timeout_on_progress(mut self, reset: bool) -> Self {
        self.reset_timeout_on_progress = reset;
        self
    }

    /// Set a ceiling on total wait
    #[must_use]
    pub fn with_max_total_timeout(mut self, max: Duration) -> Self {
        self.max_total_timeout = Some(max);
        self
    }

    /// Observe progress
    #[must_use]
    pub fn with_on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Allow the caller to cancel
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Reason sent with the cancellation notification
    #[must_use]
    pub fn with_cancel_reason(mut self, reason: impl Into<String>) -> Self {
        self.cancel_reason = Some(reason.into());
        self
    }

    /// Associate with an inbound request
    #[must_use]
    pub fn with_related_request_id(mut self, id: RequestId) -> Self {
        self.related_request_id = Some(id);
        self
    }

    /// Resume from `token`
    #[must_use]
    pub fn with_resumption_token(mut self, token: impl Into<String>) -> Self {
        self.resumption_token = Some(token.into());
        self
    }

    /// Observe resumption tokens
    #[must_use]
    pub fn with_on_resumption_token<F>(mut self, callback: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.on_resumption_token = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("timeout", &self.timeout)
            .field("reset_timeout_on_progress", &self.reset_timeout_on_progress)
            .field("max_total_timeout", &self.max_total_timeout)
            .field("on_progress", &self.on_progress.is_some())
            .field("cancellation", &self.cancellation)
            .field("cancel_reason", &self.cancel_reason)
            .field("related_request_id", &self.related_request_id)
            .field("resumption_token", &self.resumption_token)
            .finish_non_exhaustive()
    }
}

/// Options for one outbound notification.
#[derive(Debug, Clone, Default)]
pub struct NotificationOptions {
    /// Inbound request this notification belongs to
    pub related_request_id: Option<RequestId>,
}

impl NotificationOptions {
    /// Default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notification tied to an inbound request
    #[must_use]
    pub fn related_to(id: RequestId) -> Self {
        Self {
            related_request_id: Some(id),
        }
    }
}
