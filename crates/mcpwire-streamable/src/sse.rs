//! Server-Sent Events encoding and incremental decoding.
//!
//! No I/O happens here. The server encodes events into body frames and the
//! client feeds raw body chunks into an [`SseParser`].
//!
//! ```text
//! id: 3f2a..._7
//! event: message
//! data: {"jsonrpc":"2.0", ...}
//!
//! ```

use mcpwire_core::JsonRpcMessage;

/// Event type carrying JSON-RPC envelopes
pub const MESSAGE_EVENT: &str = "message";

/// A single Server-Sent Event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseEvent {
    /// Event id, used as the resumption token
    pub id: Option<String>,
    /// Event type; absent means `message`
    pub event: Option<String>,
    /// Payload, possibly multi-line
    pub data: String,
    /// Reconnection delay hint in milliseconds
    pub retry: Option<u32>,
}

impl SseEvent {
    /// A data-only event
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            id: None,
            event: None,
            data: data.into(),
            retry: None,
        }
    }

    /// A `message` event carrying one envelope.
    pub fn message(message: &JsonRpcMessage) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_string(message)?).with_event(MESSAGE_EVENT))
    }

    /// Set the event id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the event type
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Set the retry hint
    #[must_use]
    pub fn with_retry(mut self, retry_ms: u32) -> Self {
        self.retry = Some(retry_ms);
        self
    }

    /// Event type with the SSE default applied
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or(MESSAGE_EVENT)
    }

    /// Whether this event carries a JSON-RPC envelope
    pub fn is_message(&self) -> bool {
        self.event_type() == MESSAGE_EVENT
    }

    /// Decode the payload as an envelope
    pub fn decode_message(&self) -> Result<JsonRpcMessage, serde_json::Error> {
        serde_json::from_str(&self.data)
    }
}

/// Wire encoding for [`SseEvent`]s.
#[derive(Debug, Clone, Copy)]
pub struct SseEncoder;

impl SseEncoder {
    /// Encode an event, terminated by a blank line.
    ///
    /// Field order is `id`, `event`, `retry`, then one `data:` line per
    /// payload line.
    pub fn encode(event: &SseEvent) -> String {
        let mut output = String::with_capacity(event.data.len() + 32);

        if let Some(id) = &event.id {
            output.push_str("id: ");
            output.push_str(id);
            output.push('\n');
        }
        if let Some(event_type) = &event.event {
            output.push_str("event: ");
            output.push_str(event_type);
            output.push('\n');
        }
        if let Some(retry) = event.retry {
            output.push_str("retry: ");
            output.push_str(&retry.to_string());
            output.push('\n');
        }
        if event.data.is_empty() {
            output.push_str("data: \n");
        }
        for line in event.data.lines() {
            output.push_str("data: ");
            output.push_str(line);
            output.push('\n');
        }

        output.push('\n');
        output
    }

    /// Keep-alive comment frame
    pub fn keepalive() -> &'static str {
        ":\n\n"
    }
}

/// Incremental SSE decoder.
///
/// Chunks may split lines, events and even UTF-8 sequences anywhere; complete
/// events come out as soon as their terminating blank line arrives.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    id: Option<String>,
    event: Option<String>,
    data: Vec<String>,
    retry: Option<u32>,
    last_event_id: Option<String>,
}

impl SseParser {
    /// Create an empty parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a body chunk and collect the events it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (&*line, ""),
            };
            match field {
                "id" => self.id = Some(value.to_string()),
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                "retry" => self.retry = value.parse().ok(),
                _ => {}
            }
        }

        events
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if let Some(id) = &self.id {
            self.last_event_id = Some(id.clone());
        }
        if self.data.is_empty() {
            self.id = None;
            self.event = None;
            self.retry = None;
            return None;
        }

        Some(SseEvent {
            id: self.id.take(),
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
            retry: self.retry.take(),
        })
    }

    /// Id of the most recent complete event that carried one.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Drop buffered input, keeping the last event id
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.id = None;
        self.event = None;
        self.data.clear();
        self.retry = None;
    }
}
