//! Payloads of the built-in notifications the engine handles itself.

use serde::{Deserialize, Serialize};

use crate::jsonrpc::RequestId;

/// Progress token; the engine always uses the numeric id of the request
pub type ProgressToken = RequestId;

/// Progress update delivered to a request's `on_progress` callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Progress so far; increases monotonically even when `total` is unknown
    pub progress: f64,
    /// Total amount of work, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Human-readable status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `notifications/progress` params
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNotificationParams {
    /// Token from the originating request's `_meta.progressToken`
    #[serde(rename = "progressToken")]
    pub progress_token: ProgressToken,
    /// Progress values
    #[serde(flatten)]
    pub progress: Progress,
}

/// `notifications/cancelled` params
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelledNotificationParams {
    /// Request ID that was cancelled
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    /// Optional reason for cancellation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
