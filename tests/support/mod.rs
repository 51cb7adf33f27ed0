//! Shared helpers for integration tests.
#![allow(dead_code)] // each test target uses a subset

use std::collections::BTreeMap;
use unistream::context::RequestContext;
use unistream::providers::ProviderAdapter;
use unistream::stream::{StopReason, StopSignal, StreamEvent, StreamSink};
use unistream::types::{Message, MessageContent, MessageState, Usage};
use uuid::Uuid;

/// Sink that models the history collaborator: messages replace by uuid,
/// chunks append, stops record.
#[derive(Default)]
pub struct CollectorSink {
    pub text: String,
    pub started: usize,
    pub start_usage: Option<Usage>,
    messages: BTreeMap<Uuid, Message>,
    order: Vec<Uuid>,
    pub stops: Vec<StopSignal>,
}

impl CollectorSink {
    pub fn messages(&self) -> Vec<&Message> {
        self.order
            .iter()
            .filter_map(|uuid| self.messages.get(uuid))
            .collect()
    }
}

impl StreamSink for CollectorSink {
    fn on_start(&mut self, usage: Option<&Usage>) {
        self.started += 1;
        self.start_usage = usage.cloned();
    }

    fn on_chunk(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn on_messages_add(&mut self, messages: &[Message]) {
        for message in messages {
            if !self.messages.contains_key(&message.uuid) {
                self.order.push(message.uuid);
            }
            self.messages.insert(message.uuid, message.clone());
        }
    }

    fn on_stop(&mut self, signal: &StopSignal) {
        self.stops.push(signal.clone());
    }
}

/// Uuid-free digest of a canonical event sequence, for comparing replays.
#[derive(Debug, PartialEq)]
pub struct StreamSummary {
    pub text: String,
    /// (kind, rendered content, generated?) per distinct message, in
    /// first-seen order, final state
    pub messages: Vec<(String, String, bool)>,
    pub stop: Option<StopReason>,
    pub tool_uses: Vec<(String, serde_json::Value)>,
}

pub fn summarize(events: &[StreamEvent]) -> StreamSummary {
    let mut sink = CollectorSink::default();
    unistream::stream::dispatch(&mut sink, events);

    let messages = sink
        .messages()
        .iter()
        .map(|m| {
            let (kind, rendered) = match &m.content {
                MessageContent::Text { text } => ("text".to_string(), text.clone()),
                MessageContent::Thinking { text, .. } => ("thinking".to_string(), text.clone()),
                MessageContent::ToolUse(tool_use) => (
                    "tool_use".to_string(),
                    format!("{}:{}", tool_use.name, tool_use.input),
                ),
                other => ("other".to_string(), format!("{other:?}")),
            };
            (kind, rendered, m.state == MessageState::Generated)
        })
        .collect();

    let stop = sink.stops.first().map(|s| s.reason);
    let tool_uses = sink
        .stops
        .first()
        .map(|s| {
            s.tool_uses
                .iter()
                .map(|t| (t.name.clone(), t.input.clone()))
                .collect()
        })
        .unwrap_or_default();

    StreamSummary {
        text: sink.text,
        messages,
        stop,
        tool_uses,
    }
}

/// Feed a whole stream in one chunk.
pub fn feed_one_shot(adapter: &ProviderAdapter, stream: &str) -> Vec<StreamEvent> {
    let mut ctx = RequestContext::new("turn-test");
    adapter.feed(&mut ctx, stream)
}

/// Feed a stream split at the given byte offsets (deduplicated, sorted,
/// clamped to char boundaries).
pub fn feed_split(adapter: &ProviderAdapter, stream: &str, splits: &[usize]) -> Vec<StreamEvent> {
    let mut points: Vec<usize> = splits
        .iter()
        .copied()
        .filter(|&p| p > 0 && p < stream.len() && stream.is_char_boundary(p))
        .collect();
    points.sort_unstable();
    points.dedup();

    let mut ctx = RequestContext::new("turn-test");
    let mut events = Vec::new();
    let mut last = 0;
    for point in points {
        events.extend(adapter.feed(&mut ctx, &stream[last..point]));
        last = point;
    }
    events.extend(adapter.feed(&mut ctx, &stream[last..]));
    events
}
