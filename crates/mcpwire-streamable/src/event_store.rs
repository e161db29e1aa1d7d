//! Resumable delivery.
//!
//! The server stores every SSE-delivered message under an event id before it
//! is written. A client that lost its stream reconnects with `Last-Event-ID`
//! and the store replays what followed on the same stream.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use mcpwire_core::JsonRpcMessage;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

/// Identifier of one stored event
pub type EventId = String;

/// Identifier of one response stream
pub type StreamId = String;

/// Receives replayed events in order
pub type ReplaySink = mpsc::UnboundedSender<(EventId, JsonRpcMessage)>;

/// Event store failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EventStoreError {
    /// `Last-Event-ID` names an event this store never issued or already evicted
    #[error("Unknown event ID: {0}")]
    UnknownEventId(String),

    /// The replay receiver went away mid-replay
    #[error("Replay sink closed")]
    SinkClosed,

    /// Storage backend failure
    #[error("Event store backend error: {0}")]
    Backend(String),
}

/// Storage for resumable SSE delivery.
pub trait EventStore: Send + Sync + fmt::Debug {
    /// Persist `message` as the next event on `stream_id` and return its id.
    fn store_event<'a>(
        &'a self,
        stream_id: &'a str,
        message: &'a JsonRpcMessage,
    ) -> Pin<Box<dyn Future<Output = Result<EventId, EventStoreError>> + Send + 'a>>;

    /// Send every event stored on the same stream after `last_event_id` into
    /// `sink`, in order, and return that stream's id.
    fn replay_events_after<'a>(
        &'a self,
        last_event_id: &'a str,
        sink: ReplaySink,
    ) -> Pin<Box<dyn Future<Output = Result<StreamId, EventStoreError>> + Send + 'a>>;
}

#[derive(Debug)]
struct StoredEvent {
    id: EventId,
    stream_id: StreamId,
    message: JsonRpcMessage,
}

#[derive(Debug, Default)]
struct Buffer {
    sequence: u64,
    events: VecDeque<StoredEvent>,
}

/// Process-local [`EventStore`].
///
/// Event ids are `{stream_id}_{seq}` with a sequence shared by all streams.
/// With a size bound the oldest events are evicted first.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    buffer: Mutex<Buffer>,
    max_events: Option<usize>,
}

impl InMemoryEventStore {
    /// Unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_events` events
    #[must_use]
    pub fn with_max_events(mut self, max_events: usize) -> Self {
        self.max_events = Some(max_events);
        self
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.buffer.lock().events.len()
    }

    /// Whether nothing is retained
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn store(&self, stream_id: &str, message: &JsonRpcMessage) -> EventId {
        let mut buffer = self.buffer.lock();
        buffer.sequence += 1;
        let id = format!("{stream_id}_{}", buffer.sequence);
        buffer.events.push_back(StoredEvent {
            id: id.clone(),
            stream_id: stream_id.to_string(),
            message: message.clone(),
        });
        if let Some(max) = self.max_events {
            while buffer.events.len() > max {
                buffer.events.pop_front();
            }
        }
        id
    }

    fn replay(&self, last_event_id: &str, sink: &ReplaySink) -> Result<StreamId, EventStoreError> {
        let replay: Vec<(EventId, JsonRpcMessage)>;
        let stream_id;
        {
            let buffer = self.buffer.lock();
            let position = buffer
                .events
                .iter()
                .position(|event| event.id == last_event_id)
                .ok_or_else(|| EventStoreError::UnknownEventId(last_event_id.to_string()))?;
            stream_id = buffer.events[position].stream_id.clone();
            replay = buffer
                .events
                .iter()
                .skip(position + 1)
                .filter(|event| event.stream_id == stream_id)
                .map(|event| (event.id.clone(), event.message.clone()))
                .collect();
        }

        trace!(stream_id = %stream_id, count = replay.len(), "replaying events");
        for event in replay {
            sink.send(event).map_err(|_| EventStoreError::SinkClosed)?;
        }
        Ok(stream_id)
    }
}

impl EventStore for InMemoryEventStore {
    fn store_event<'a>(
        &'a self,
        stream_id: &'a str,
        message: &'a JsonRpcMessage,
    ) -> Pin<Box<dyn Future<Output = Result<EventId, EventStoreError>> + Send + 'a>> {
        Box::pin(async move { Ok(self.store(stream_id, message)) })
    }

    fn replay_events_after<'a>(
        &'a self,
        last_event_id: &'a str,
        sink: ReplaySink,
    ) -> Pin<Box<dyn Future<Output = Result<StreamId, EventStoreError>> + Send + 'a>> {
        Box::pin(async move { self.replay(last_event_id, &sink) })
    }
}
