//! In-process transport pair.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mcpwire_core::JsonRpcMessage;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::events::{MessageExtra, TransportEventEmitter, TransportEvents};
use crate::traits::{Transport, TransportSendOptions};

#[derive(Debug)]
struct Link {
    closed: AtomicBool,
    session_id: Option<String>,
    inboxes: [TransportEventEmitter; 2],
    receivers: [Mutex<Option<TransportEvents>>; 2],
}

/// One end of a linked in-process transport pair.
///
/// Messages sent before the other end calls `start` are buffered. Closing
/// either end closes both.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    side: usize,
    link: Arc<Link>,
}

impl ChannelTransport {
    /// Two connected ends with no session id
    #[must_use]
    pub fn pair() -> (Self, Self) {
        Self::build(None)
    }

    /// Two connected ends; every delivered message carries `session_id`
    #[must_use]
    pub fn pair_with_session(session_id: impl Into<String>) -> (Self, Self) {
        Self::build(Some(session_id.into()))
    }

    fn build(session_id: Option<String>) -> (Self, Self) {
        let (left_tx, left_rx) = TransportEventEmitter::new();
        let (right_tx, right_rx) = TransportEventEmitter::new();
        let link = Arc::new(Link {
            closed: AtomicBool::new(false),
            session_id,
            inboxes: [left_tx, right_tx],
            receivers: [Mutex::new(Some(left_rx)), Mutex::new(Some(right_rx))],
        });
        (
            Self {
                side: 0,
                link: Arc::clone(&link),
            },
            Self { side: 1, link },
        )
    }

    fn peer_inbox(&self) -> &TransportEventEmitter {
        &self.link.inboxes[1 - self.side]
    }

    /// Whether either end has been closed
    pub fn is_closed(&self) -> bool {
        self.link.closed.load(Ordering::Acquire)
    }
}

impl Transport for ChannelTransport {
    fn start(&self) -> Pin<Box<dyn Future<Output = TransportResult<TransportEvents>> + Send + '_>> {
        Box::pin(async move {
            self.link.receivers[self.side]
                .lock()
                .take()
                .ok_or(TransportError::AlreadyStarted)
        })
    }

    fn send(
        &self,
        message: JsonRpcMessage,
        _options: TransportSendOptions,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if self.is_closed() {
                return Err(TransportError::NotConnected);
            }
            let extra = MessageExtra {
                session_id: self.link.session_id.clone(),
                auth_token: None,
            };
            if self.peer_inbox().emit_message(message, extra) {
                Ok(())
            } else {
                Err(TransportError::ConnectionLost("peer dropped its receiver".into()))
            }
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            if !self.link.closed.swap(true, Ordering::AcqRel) {
                debug!(side = self.side, "closing channel transport pair");
                for inbox in &self.link.inboxes {
                    inbox.emit_closed();
                }
            }
            Ok(())
        })
    }

    fn session_id(&self) -> Option<String> {
        self.link.session_id.clone()
    }
}
