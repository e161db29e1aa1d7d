//! Transport event types.

use mcpwire_core::JsonRpcMessage;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Receiving half handed out by [`Transport::start`](crate::Transport::start)
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Side information delivered with an inbound message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageExtra {
    /// Session the message arrived on, if the transport has sessions
    pub session_id: Option<String>,
    /// Bearer token presented with the message
    pub auth_token: Option<String>,
}

/// Everything a transport reports to its consumer.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// An inbound envelope.
    Message {
        /// The decoded envelope
        message: JsonRpcMessage,
        /// Session and auth details
        extra: MessageExtra,
    },

    /// A failure that did not end the connection.
    Error(TransportError),

    /// The connection is gone; no further events follow.
    Closed,
}

/// Producer side of a transport's event channel.
///
/// Emission never blocks; events sent after the consumer went away are
/// discarded.
#[derive(Debug, Clone)]
pub struct TransportEventEmitter {
    sender: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEventEmitter {
    /// Creates a new event emitter and a corresponding receiver.
    #[must_use]
    pub fn new() -> (Self, TransportEvents) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Emits an event. Returns `false` if the consumer is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Emits a `Message` event.
    pub fn emit_message(&self, message: JsonRpcMessage, extra: MessageExtra) -> bool {
        self.emit(TransportEvent::Message { message, extra })
    }

    /// Emits an `Error` event.
    pub fn emit_error(&self, error: TransportError) -> bool {
        self.emit(TransportEvent::Error(error))
    }

    /// Emits a `Closed` event.
    pub fn emit_closed(&self) -> bool {
        self.emit(TransportEvent::Closed)
    }

    /// Whether the consumer dropped its receiver
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpwire_core::JsonRpcNotification;

    #[tokio::test]
    async fn test_transport_event_emitter() {
        let (emitter, mut receiver) = TransportEventEmitter::new();

        emitter.emit_message(
            JsonRpcNotification::new("notifications/initialized", None).into(),
            MessageExtra {
                session_id: Some("abc".into()),
                auth_token: None,
            },
        );
        emitter.emit_closed();

        match receiver.recv().await.unwrap() {
            TransportEvent::Message { message, extra } => {
                assert_eq!(message.method(), Some("notifications/initialized"));
                assert_eq!(extra.session_id.as_deref(), Some("abc"));
            }
            other => panic!("Unexpected event: {other:?}"),
        }
        assert!(matches!(receiver.recv().await, Some(TransportEvent::Closed)));
    }

    #[test]
    fn test_emit_after_consumer_dropped() {
        let (emitter, receiver) = TransportEventEmitter::new();
        drop(receiver);
        assert!(emitter.is_closed());
        assert!(!emitter.emit_closed());
    }
}
