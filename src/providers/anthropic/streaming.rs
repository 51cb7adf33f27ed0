//! Claude-style streaming adapter.
//!
//! State machine over SSE events carrying vendor-indexed content blocks:
//! `message_start`, `content_block_start`, `content_block_delta`,
//! `content_block_stop`, `message_delta`, `message_stop`, plus out-of-band
//! `error` events and `ping` keep-alives. Deltas for a given index are
//! applied in arrival order; nothing is reordered or buffered across
//! indices.

use crate::context::{BlockKind, RequestContext, ToolUseBuffer};
use crate::providers::AdapterConfig;
use crate::stream::{EventBuilder, StopSignal, StreamEvent};
use crate::types::{ResponseMetadata, Usage, strip_delegated};
use serde::Deserialize;

/// Synthetic marker opening an inline thinking section in the plain-text
/// stream.
pub const THINK_OPEN: &str = "<think>\n";
/// Matching close marker; a leading newline is prepended when the last
/// thinking character was not already one.
pub const THINK_CLOSE: &str = "</think>\n\n";

/// Claude stream event structure
///
/// Flexible across the event types of the SSE stream; unused fields on a
/// given event type simply deserialize to `None`.
#[derive(Debug, Clone, Deserialize)]
struct AnthropicStreamEvent {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    message: Option<AnthropicMessageStart>,
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    content_block: Option<AnthropicContentBlock>,
    #[serde(default)]
    delta: Option<AnthropicDelta>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicMessageStart {
    id: Option<String>,
    model: Option<String>,
    usage: Option<AnthropicUsage>,
}

/// Content block payload on `content_block_start`
#[derive(Debug, Clone, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    /// Initial text, usually empty on start events
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    /// Opaque payload of a redacted_thinking block
    #[serde(default)]
    data: Option<String>,
    // tool_use fields
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}

/// Delta payload; the subtype is implied by which field is present
/// (text_delta, thinking_delta, input_json_delta, signature_delta).
#[derive(Debug, Clone, Deserialize)]
struct AnthropicDelta {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    partial_json: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
    cache_creation_input_tokens: Option<u32>,
    cache_read_input_tokens: Option<u32>,
}

impl AnthropicUsage {
    fn to_usage(&self) -> Usage {
        let prompt = self.input_tokens.unwrap_or(0);
        let completion = self.output_tokens.unwrap_or(0);
        let cached = match (self.cache_read_input_tokens, self.cache_creation_input_tokens) {
            (None, None) => None,
            (read, written) => Some(read.unwrap_or(0) + written.unwrap_or(0)),
        };
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
            cached_tokens: cached,
            reasoning_tokens: None,
        }
    }
}

/// Claude-style adapter
pub struct AnthropicAdapter {
    delegated_auth: bool,
}

impl AnthropicAdapter {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            delegated_auth: config.delegated_auth,
        }
    }

    /// Consume a raw transport chunk; SSE framing is buffered in the context.
    pub fn feed(&self, ctx: &mut RequestContext, chunk: &str) -> Vec<StreamEvent> {
        let frames = ctx.sse.feed(chunk);
        let mut events = Vec::new();
        for frame in frames {
            events.extend(self.handle_frame(ctx, frame.event.as_deref(), &frame.data));
        }
        events
    }

    /// Process one SSE data payload with its event-name hint.
    pub fn handle_frame(
        &self,
        ctx: &mut RequestContext,
        hint: Option<&str>,
        data: &str,
    ) -> Vec<StreamEvent> {
        if data.trim().is_empty() {
            return Vec::new();
        }

        tracing::debug!(?hint, data, "claude frame");
        let event: AnthropicStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                // transient: body may have been split by the transport, wait
                tracing::debug!(error = %e, "undecodable claude frame, waiting for more input");
                return Vec::new();
            }
        };

        let event_type = if event.r#type.is_empty() {
            hint.unwrap_or("")
        } else {
            event.r#type.as_str()
        };

        match event_type {
            "message_start" => self.on_message_start(ctx, &event),
            "content_block_start" => self.on_block_start(ctx, &event),
            "content_block_delta" => self.on_block_delta(ctx, &event),
            "content_block_stop" => self.on_block_stop(ctx, event.index.unwrap_or(0)),
            "message_delta" => self.on_message_delta(ctx, &event),
            "message_stop" => self.on_message_stop(ctx),
            "error" => self.on_error(ctx, &event, data),
            "ping" => Vec::new(),
            _ if event.error.is_some() => self.on_error(ctx, &event, data),
            other => {
                tracing::debug!(event_type = other, "ignoring unknown claude event");
                Vec::new()
            }
        }
    }

    fn on_message_start(
        &self,
        ctx: &mut RequestContext,
        event: &AnthropicStreamEvent,
    ) -> Vec<StreamEvent> {
        if let Some(message) = &event.message {
            ctx.metadata = Some(ResponseMetadata {
                id: message.id.clone(),
                model: message.model.clone(),
                created: Some(chrono::Utc::now()),
                provider: "anthropic".to_string(),
            });
            if let Some(usage) = &message.usage {
                ctx.usage = Some(usage.to_usage());
            }
        }
        if ctx.started {
            return Vec::new();
        }
        ctx.started = true;
        EventBuilder::new().add_start(ctx.usage.clone()).build()
    }

    fn on_block_start(
        &self,
        ctx: &mut RequestContext,
        event: &AnthropicStreamEvent,
    ) -> Vec<StreamEvent> {
        let index = event.index.unwrap_or(0);
        let Some(content_block) = &event.content_block else {
            return Vec::new();
        };

        let mut builder = EventBuilder::new();
        match content_block.block_type.as_str() {
            "text" => {
                let block = ctx.start_block(index, BlockKind::Text);
                if let Some(text) = &content_block.text {
                    block.text.push_str(text);
                    builder = builder.add_chunk(text.clone());
                }
            }
            "thinking" => {
                let block = ctx.start_block(index, BlockKind::Thinking);
                let initial = content_block.thinking.clone().unwrap_or_default();
                block.text.push_str(&initial);
                builder = builder.add_chunk(THINK_OPEN).add_chunk(initial);
            }
            "redacted_thinking" => {
                let block = ctx.start_block(index, BlockKind::RedactedThinking);
                if let Some(data) = &content_block.data {
                    block.text.push_str(data);
                }
                // opaque payload, no message and nothing rendered
                return Vec::new();
            }
            "tool_use" => {
                let name = content_block.name.clone().unwrap_or_default();
                let name = if self.delegated_auth {
                    strip_delegated(&name).to_string()
                } else {
                    name
                };
                let mut buffer =
                    ToolUseBuffer::new(content_block.id.clone().unwrap_or_default(), name);
                // some models ship a non-empty input object up front
                if let Some(input) = &content_block.input
                    && input.as_object().is_some_and(|obj| !obj.is_empty())
                {
                    buffer.input_json = input.to_string();
                    buffer.parsed_input = Some(input.clone());
                }
                ctx.start_block(index, BlockKind::ToolUse).tool_use = Some(buffer);
            }
            other => {
                tracing::debug!(block_type = other, "ignoring unknown content block type");
                return Vec::new();
            }
        }

        if let Some(message) = ctx.message_for_block(index) {
            builder = builder.add_message(message);
        }
        builder.build()
    }

    fn on_block_delta(
        &self,
        ctx: &mut RequestContext,
        event: &AnthropicStreamEvent,
    ) -> Vec<StreamEvent> {
        let index = event.index.unwrap_or(0);
        let Some(delta) = &event.delta else {
            return Vec::new();
        };
        let mut builder = EventBuilder::new();

        if let Some(text) = &delta.text {
            if ctx.block_mut(index).is_none() {
                ctx.start_block(index, BlockKind::Text);
            }
            if let Some(block) = ctx.block_mut(index) {
                block.text.push_str(text);
            }
            builder = builder.add_chunk(text.clone());
            if let Some(message) = ctx.message_for_block(index) {
                builder = builder.add_message(message);
            }
        } else if let Some(thinking) = &delta.thinking {
            if ctx.block_mut(index).is_none() {
                ctx.start_block(index, BlockKind::Thinking);
                builder = builder.add_chunk(THINK_OPEN);
            }
            if let Some(block) = ctx.block_mut(index) {
                block.text.push_str(thinking);
            }
            builder = builder.add_chunk(thinking.clone());
            if let Some(message) = ctx.message_for_block(index) {
                builder = builder.add_message(message);
            }
        } else if let Some(fragment) = &delta.partial_json {
            // arguments are revealed only at block stop; emitting the raw
            // fragment here would surface invalid JSON mid-stream
            if let Some(buffer) = ctx.block_mut(index).and_then(|b| b.tool_use.as_mut()) {
                buffer.push_fragment(fragment);
            }
        } else if let Some(signature) = &delta.signature {
            if let Some(block) = ctx.block_mut(index) {
                block.signature.push_str(signature);
            }
        } else if let Some(data) = &delta.data {
            if let Some(block) = ctx.block_mut(index) {
                block.text.push_str(data);
            }
        }

        builder.build()
    }

    fn on_block_stop(&self, ctx: &mut RequestContext, index: usize) -> Vec<StreamEvent> {
        let Some(block) = ctx.block_mut(index) else {
            return Vec::new();
        };
        block.stopped = true;
        let kind = block.kind;
        let close_needs_newline = !block.text.ends_with('\n');

        let mut builder = EventBuilder::new();
        if kind == BlockKind::Thinking {
            builder = builder.add_chunk(if close_needs_newline {
                format!("\n{THINK_CLOSE}")
            } else {
                THINK_CLOSE.to_string()
            });
        }
        if let Some(message) = ctx.message_for_block(index) {
            builder = builder.add_message(message);
        }
        builder.build()
    }

    fn on_message_delta(
        &self,
        ctx: &mut RequestContext,
        event: &AnthropicStreamEvent,
    ) -> Vec<StreamEvent> {
        if let Some(usage) = &event.usage {
            match ctx.usage.as_mut() {
                Some(current) => {
                    if let Some(output) = usage.output_tokens {
                        current.set_completion_tokens(output);
                    }
                    if let Some(input) = usage.input_tokens {
                        current.prompt_tokens = input;
                        current.total_tokens = input + current.completion_tokens;
                    }
                }
                None => ctx.usage = Some(usage.to_usage()),
            }
        }

        let Some(stop_reason) = event.delta.as_ref().and_then(|d| d.stop_reason.as_deref())
        else {
            // no terminal emission yet, message_stop or a later delta decides
            return Vec::new();
        };
        if !ctx.claim_stop() {
            return Vec::new();
        }

        let usage = ctx.usage.clone();
        let signal = match stop_reason {
            "end_turn" | "stop_sequence" => StopSignal::complete(usage),
            "max_tokens" => StopSignal::max_tokens(usage),
            "tool_use" => StopSignal::tool_use(usage, ctx.finished_tool_uses()),
            other => {
                tracing::warn!(stop_reason = other, "unknown claude stop reason");
                StopSignal {
                    usage,
                    ..StopSignal::error(serde_json::json!({ "stop_reason": other }))
                }
            }
        };
        EventBuilder::new().add_stop(signal).build()
    }

    fn on_message_stop(&self, ctx: &mut RequestContext) -> Vec<StreamEvent> {
        if !ctx.claim_stop() {
            return Vec::new();
        }
        EventBuilder::new()
            .add_stop(StopSignal::complete(ctx.usage.clone()))
            .build()
    }

    fn on_error(
        &self,
        ctx: &mut RequestContext,
        event: &AnthropicStreamEvent,
        raw: &str,
    ) -> Vec<StreamEvent> {
        if !ctx.claim_stop() {
            return Vec::new();
        }
        let payload = event
            .error
            .clone()
            .unwrap_or_else(|| serde_json::json!({ "message": raw }));
        EventBuilder::new().add_stop(StopSignal::error(payload)).build()
    }
}
