//! Canonical streaming events and the callback contract.
//!
//! Every vendor adapter reduces its wire protocol to the event sequence
//! defined here. Consumers either pattern-match [`StreamEvent`] directly or
//! implement [`StreamSink`] and let [`dispatch`] route events into callbacks.

use crate::types::{Message, ToolUse, Usage};
use serde::{Deserialize, Serialize};

/// Reason why a stream terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model finished its turn naturally.
    ///
    /// Maps to:
    /// - Claude: `end_turn`, `stop_sequence`
    /// - OpenAI: `stop`, `eos_token`
    /// - Gemini: `STOP`
    /// - Cohere: `COMPLETE`
    Complete,

    /// The model stopped to invoke one or more tools.
    ///
    /// Maps to:
    /// - Claude: `tool_use`
    /// - OpenAI: `tool_calls`
    /// - Gemini: `TOOL_CODE`, `TOOL_CODE_EXECUTING`, or `STOP` after a
    ///   `functionCall` part was seen
    ToolUse,

    /// The model hit its output token limit.
    ///
    /// Maps to:
    /// - Claude: `max_tokens`
    /// - OpenAI: `length`
    /// - Gemini: `MAX_TOKENS`
    /// - Cohere: `MAX_TOKENS`
    MaxTokens,

    /// The vendor reported an error, the content was filtered, or the stop
    /// reason was unrecognized.
    Error,
}

/// Terminal classification of a stream. At most one per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSignal {
    pub reason: StopReason,
    /// Final token accounting, when the vendor reported any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Raw vendor error payload for `StopReason::Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    /// Tool invocations delivered with the stop (OpenAI-style protocols hand
    /// the finished list over only at `finish_reason`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_uses: Vec<ToolUse>,
}

impl StopSignal {
    pub fn complete(usage: Option<Usage>) -> Self {
        Self {
            reason: StopReason::Complete,
            usage,
            error: None,
            tool_uses: Vec::new(),
        }
    }

    pub fn max_tokens(usage: Option<Usage>) -> Self {
        Self {
            reason: StopReason::MaxTokens,
            usage,
            error: None,
            tool_uses: Vec::new(),
        }
    }

    pub fn tool_use(usage: Option<Usage>, tool_uses: Vec<ToolUse>) -> Self {
        Self {
            reason: StopReason::ToolUse,
            usage,
            error: None,
            tool_uses,
        }
    }

    pub fn error(payload: serde_json::Value) -> Self {
        Self {
            reason: StopReason::Error,
            usage: None,
            error: Some(payload),
            tool_uses: Vec::new(),
        }
    }
}

/// Canonical stream event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Fired once, at stream start, when the vendor provides early usage
    Start { usage: Option<Usage> },
    /// Plain-text fragment for live rendering, including synthetic
    /// `<think>`/`</think>` markers
    Chunk { text: String },
    /// Messages created or updated; consumers replace by uuid
    MessagesAdd { messages: Vec<Message> },
    /// Terminal signal, fired exactly once
    Stop { signal: StopSignal },
}

/// Callback contract consumed by the history/UI collaborators.
pub trait StreamSink {
    fn on_start(&mut self, _usage: Option<&Usage>) {}
    fn on_chunk(&mut self, _text: &str) {}
    fn on_messages_add(&mut self, _messages: &[Message]) {}
    fn on_stop(&mut self, _signal: &StopSignal) {}
}

/// Route canonical events into the sink callbacks, in order.
pub fn dispatch(sink: &mut dyn StreamSink, events: &[StreamEvent]) {
    for event in events {
        match event {
            StreamEvent::Start { usage } => sink.on_start(usage.as_ref()),
            StreamEvent::Chunk { text } => sink.on_chunk(text),
            StreamEvent::MessagesAdd { messages } => sink.on_messages_add(messages),
            StreamEvent::Stop { signal } => sink.on_stop(signal),
        }
    }
}

/// Helper for efficient event building
pub struct EventBuilder {
    events: Vec<StreamEvent>,
}

impl EventBuilder {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(2), // Most conversions produce 1-2 events
        }
    }

    /// Add a Start event
    pub fn add_start(mut self, usage: Option<Usage>) -> Self {
        self.events.push(StreamEvent::Start { usage });
        self
    }

    /// Add a Chunk event (only if the text is not empty)
    pub fn add_chunk(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.is_empty() {
            self.events.push(StreamEvent::Chunk { text });
        }
        self
    }

    /// Add a MessagesAdd event with a single message
    pub fn add_message(mut self, message: Message) -> Self {
        self.events.push(StreamEvent::MessagesAdd {
            messages: vec![message],
        });
        self
    }

    /// Add a MessagesAdd event (only if the list is not empty)
    pub fn add_messages(mut self, messages: Vec<Message>) -> Self {
        if !messages.is_empty() {
            self.events.push(StreamEvent::MessagesAdd { messages });
        }
        self
    }

    /// Add a Stop event
    pub fn add_stop(mut self, signal: StopSignal) -> Self {
        self.events.push(StreamEvent::Stop { signal });
        self
    }

    /// Append an already-built event
    pub fn push(mut self, event: StreamEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Build the events vector
    pub fn build(self) -> Vec<StreamEvent> {
        self.events
    }
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new()
    }
}
