//! OpenAI-style streaming adapter.
//!
//! No explicit block indices: a single implicit message accumulates
//! `delta.content`, reasoning text streams inline between synthetic
//! `<think>` markers, and tool calls assemble from `tool_calls[].index`-keyed
//! fragments until `finish_reason` hands the finished list over.

use crate::context::{BlockKind, RequestContext, ToolUseBuffer};
use crate::providers::AdapterConfig;
use crate::stream::{EventBuilder, StopSignal, StreamEvent};
use crate::types::{ResponseMetadata, Usage, strip_delegated};
use serde::Deserialize;

/// Synthetic marker opening inline reasoning in the plain-text stream.
pub const THINK_OPEN: &str = "<think>\n";

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamEvent {
    id: Option<String>,
    model: Option<String>,
    choices: Option<Vec<OpenAiStreamChoice>>,
    usage: Option<OpenAiStreamUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiStreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
    /// Reasoning text; two vendor spellings, treated identically
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

impl OpenAiStreamDelta {
    fn reasoning_text(&self) -> Option<&str> {
        self.reasoning_content
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.reasoning.as_deref().filter(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    total_tokens: Option<u32>,
    prompt_tokens_details: Option<OpenAiPromptTokensDetails>,
    completion_tokens_details: Option<OpenAiCompletionTokensDetails>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiPromptTokensDetails {
    cached_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiCompletionTokensDetails {
    reasoning_tokens: Option<u32>,
}

impl OpenAiStreamUsage {
    fn to_usage(&self) -> Usage {
        let prompt = self.prompt_tokens.unwrap_or(0);
        let completion = self.completion_tokens.unwrap_or(0);
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: self.total_tokens.unwrap_or(prompt + completion),
            cached_tokens: self
                .prompt_tokens_details
                .as_ref()
                .and_then(|d| d.cached_tokens),
            reasoning_tokens: self
                .completion_tokens_details
                .as_ref()
                .and_then(|d| d.reasoning_tokens),
        }
    }
}

/// OpenAI-style adapter
pub struct OpenAiAdapter {
    model: String,
    delegated_auth: bool,
}

impl OpenAiAdapter {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            model: config.model.clone(),
            delegated_auth: config.delegated_auth,
        }
    }

    /// Apply the model-conditional request shaping rule to an outbound body.
    pub fn shape_request(&self, body: &mut serde_json::Value) {
        super::transformers::shape_chat_request(body, &self.model);
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

    /// Process one SSE data payload.
    pub fn handle_frame(
        &self,
        ctx: &mut RequestContext,
        _hint: Option<&str>,
        data: &str,
    ) -> Vec<StreamEvent> {
        let data = data.trim();
        if data.is_empty() {
            return Vec::new();
        }
        if data == "[DONE]" {
            // most streams stop via finish_reason before the sentinel; the
            // guard keeps on_stop at exactly once either way
            if !ctx.claim_stop() {
                return Vec::new();
            }
            let builder = self.close_think_tag(ctx, EventBuilder::new());
            let builder = self.finish_text_block(ctx, builder);
            let usage = ctx.usage.clone();
            return builder.add_stop(StopSignal::complete(usage)).build();
        }

        tracing::debug!(data, "openai frame");
        let event: OpenAiStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "undecodable openai frame, waiting for more input");
                return Vec::new();
            }
        };

        let mut builder = EventBuilder::new();

        if !ctx.started {
            ctx.started = true;
            ctx.metadata = Some(ResponseMetadata {
                id: event.id.clone(),
                model: event.model.clone(),
                created: Some(chrono::Utc::now()),
                provider: "openai".to_string(),
            });
            builder = builder.add_start(None);
        }

        if let Some(usage) = &event.usage {
            ctx.usage = Some(usage.to_usage());
        }

        let Some(choice) = event.choices.as_ref().and_then(|c| c.first()) else {
            return builder.build();
        };

        if let Some(delta) = &choice.delta {
            if let Some(reasoning) = delta.reasoning_text() {
                if !ctx.returned_think_start_tag {
                    ctx.returned_think_start_tag = true;
                    builder = builder.add_chunk(THINK_OPEN);
                }
                ctx.last_think_char_newline = reasoning.ends_with('\n');
                let index = ctx.ensure_block(BlockKind::Thinking);
                if let Some(block) = ctx.block_mut(index) {
                    block.text.push_str(reasoning);
                }
                builder = builder.add_chunk(reasoning.to_string());
                if let Some(message) = ctx.message_for_block(index) {
                    builder = builder.add_message(message);
                }
            }

            if let Some(content) = delta.content.as_deref().filter(|s| !s.is_empty()) {
                builder = self.close_think_tag(ctx, builder);
                let index = ctx.ensure_block(BlockKind::Text);
                if let Some(block) = ctx.block_mut(index) {
                    block.text.push_str(content);
                }
                builder = builder.add_chunk(content.to_string());
                if let Some(message) = ctx.message_for_block(index) {
                    builder = builder.add_message(message);
                }
            }

            if let Some(tool_calls) = &delta.tool_calls {
                for tool_call in tool_calls {
                    self.accumulate_tool_call(ctx, tool_call);
                }
            }
        }

        if let Some(finish_reason) = choice.finish_reason.as_deref() {
            builder = self.on_finish(ctx, builder, finish_reason);
        }

        builder.build()
    }

    fn accumulate_tool_call(&self, ctx: &mut RequestContext, tool_call: &OpenAiToolCallDelta) {
        let index = tool_call.index.unwrap_or(0);
        let buffer = ctx.tool_calls.entry(index).or_default();

        // the first fragment carries name/id, the rest only argument text
        if let Some(id) = &tool_call.id
            && buffer.id.is_empty()
        {
            buffer.id = id.clone();
        }
        if let Some(function) = &tool_call.function {
            if let Some(name) = &function.name
                && buffer.name.is_empty()
            {
                buffer.name = if self.delegated_auth {
                    strip_delegated(name).to_string()
                } else {
                    name.clone()
                };
            }
            if let Some(arguments) = &function.arguments {
                buffer.push_fragment(arguments);
            }
        }
    }

    fn on_finish(
        &self,
        ctx: &mut RequestContext,
        builder: EventBuilder,
        finish_reason: &str,
    ) -> EventBuilder {
        if !ctx.claim_stop() {
            return builder;
        }
        let builder = self.close_think_tag(ctx, builder);
        let mut builder = self.finish_text_block(ctx, builder);
        let usage = ctx.usage.clone();

        let signal = match finish_reason {
            "stop" | "eos_token" => StopSignal::complete(usage),
            "length" => StopSignal::max_tokens(usage),
            "tool_calls" => {
                let mut messages = Vec::new();
                for (_, buffer) in std::mem::take(&mut ctx.tool_calls) {
                    let index = ctx.next_block_index();
                    let block = ctx.start_block(index, BlockKind::ToolUse);
                    block.tool_use = Some(buffer);
                    block.stopped = true;
                    if let Some(message) = ctx.message_for_block(index) {
                        messages.push(message);
                    }
                }
                builder = builder.add_messages(messages);
                StopSignal::tool_use(usage, ctx.finished_tool_uses())
            }
            "content_filter" => StopSignal {
                usage,
                ..StopSignal::error(serde_json::json!({ "finish_reason": "content_filter" }))
            },
            other => {
                tracing::warn!(finish_reason = other, "unknown openai finish reason");
                StopSignal {
                    usage,
                    ..StopSignal::error(serde_json::json!({ "finish_reason": other }))
                }
            }
        };
        builder.add_stop(signal)
    }

    /// Emit the synthetic close marker exactly once, before content resumes
    /// or the stream terminates.
    fn close_think_tag(&self, ctx: &mut RequestContext, builder: EventBuilder) -> EventBuilder {
        if !ctx.returned_think_start_tag || ctx.think_tag_closed {
            return builder;
        }
        ctx.think_tag_closed = true;
        let close = if ctx.last_think_char_newline {
            "</think>\n"
        } else {
            "\n</think>\n"
        };
        let mut builder = builder.add_chunk(close);
        if let Some(index) = ctx
            .content_blocks
            .values()
            .find(|b| b.kind == BlockKind::Thinking && !b.stopped)
            .map(|b| b.index)
        {
            if let Some(block) = ctx.block_mut(index) {
                block.stopped = true;
            }
            if let Some(message) = ctx.message_for_block(index) {
                builder = builder.add_message(message);
            }
        }
        builder
    }

    fn finish_text_block(&self, ctx: &mut RequestContext, builder: EventBuilder) -> EventBuilder {
        let Some(index) = ctx
            .content_blocks
            .values()
            .find(|b| b.kind == BlockKind::Text && !b.stopped)
            .map(|b| b.index)
        else {
            return builder;
        };
        if let Some(block) = ctx.block_mut(index) {
            block.stopped = true;
        }
        match ctx.message_for_block(index) {
            Some(message) => builder.add_message(message),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StopReason;
    use crate::types::MessageState;

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new(&AdapterConfig::new("openai", "gpt-4o"))
    }

    fn data(json: &str) -> String {
        format!("data: {json}\n\n")
    }

    fn chunks_of(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn stop_of(events: &[StreamEvent]) -> Option<&StopSignal> {
        events.iter().find_map(|e| match e {
            StreamEvent::Stop { signal } => Some(signal),
            _ => None,
        })
    }

    #[test]
    fn content_accumulates_into_one_message() {
        let adapter = adapter();
        let mut ctx = RequestContext::new("turn");

        let stream = [
            data(r#"{"id":"cmpl-1","model":"gpt-4o","choices":[{"delta":{"content":"Hel"}}]}"#),
            data(r#"{"choices":[{"delta":{"content":"lo"}}]}"#),
            data(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            "data: [DONE]\n\n".to_string(),
        ]
        .concat();

        let events = adapter.feed(&mut ctx, &stream);
        assert_eq!(chunks_of(&events), "Hello");

        let last_message = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::MessagesAdd { messages } => messages.last(),
                _ => None,
            })
            .next_back()
            .unwrap();
        assert_eq!(last_message.text(), Some("Hello"));
        assert_eq!(last_message.state, MessageState::Generated);

        // finish_reason stopped the stream; [DONE] must not emit a second stop
        let stops = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Stop { .. }))
            .count();
        assert_eq!(stops, 1);
        assert_eq!(stop_of(&events).unwrap().reason, StopReason::Complete);
    }

    #[test]
    fn tool_call_fragments_concatenate_in_order() {
        let adapter = adapter();
        let mut ctx = RequestContext::new("turn");

        let stream = [
            data(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"x","function":{"name":"foo","arguments":"{\"a\":1"}}]}}]}"#),
            data(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"}"}}]}}]}"#),
            data(r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#),
        ]
        .concat();

        let events = adapter.feed(&mut ctx, &stream);
        let signal = stop_of(&events).unwrap();
        assert_eq!(signal.reason, StopReason::ToolUse);
        assert_eq!(signal.tool_uses.len(), 1);
        assert_eq!(signal.tool_uses[0].id, "x");
        assert_eq!(signal.tool_uses[0].name, "foo");
        assert_eq!(signal.tool_uses[0].input, serde_json::json!({"a": 1}));
    }

    #[test]
    fn reasoning_is_framed_and_closed_before_content() {
        let adapter = adapter();
        let mut ctx = RequestContext::new("turn");

        let stream = [
            data(r#"{"choices":[{"delta":{"reasoning_content":"let me think"}}]}"#),
            data(r#"{"choices":[{"delta":{"reasoning":" more"}}]}"#),
            data(r#"{"choices":[{"delta":{"content":"Answer"}}]}"#),
            data(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
        ]
        .concat();

        let events = adapter.feed(&mut ctx, &stream);
        assert_eq!(
            chunks_of(&events),
            "<think>\nlet me think more\n</think>\nAnswer"
        );
    }

    #[test]
    fn reasoning_close_skips_extra_newline_after_newline() {
        let adapter = adapter();
        let mut ctx = RequestContext::new("turn");

        let stream = [
            data(r#"{"choices":[{"delta":{"reasoning_content":"thought\n"}}]}"#),
            data(r#"{"choices":[{"delta":{"content":"ok"}}]}"#),
        ]
        .concat();

        let events = adapter.feed(&mut ctx, &stream);
        assert_eq!(chunks_of(&events), "<think>\nthought\n</think>\nok");
    }

    #[test]
    fn length_maps_to_max_tokens_with_usage() {
        let adapter = adapter();
        let mut ctx = RequestContext::new("turn");

        let stream = [
            data(r#"{"choices":[{"delta":{"content":"partial"}}]}"#),
            data(r#"{"choices":[{"delta":{},"finish_reason":"length"}],"usage":{"prompt_tokens":5,"completion_tokens":7,"total_tokens":12}}"#),
        ]
        .concat();

        let events = adapter.feed(&mut ctx, &stream);
        let signal = stop_of(&events).unwrap();
        assert_eq!(signal.reason, StopReason::MaxTokens);
        assert_eq!(signal.usage.as_ref().unwrap().total_tokens, 12);
    }

    #[test]
    fn unknown_finish_reason_maps_to_error() {
        let adapter = adapter();
        let mut ctx = RequestContext::new("turn");
        let events = adapter.feed(
            &mut ctx,
            &data(r#"{"choices":[{"delta":{},"finish_reason":"banana"}]}"#),
        );
        assert_eq!(stop_of(&events).unwrap().reason, StopReason::Error);
    }

    #[test]
    fn reasoning_left_open_is_closed_at_finish() {
        let adapter = adapter();
        let mut ctx = RequestContext::new("turn");
        let stream = [
            data(r#"{"choices":[{"delta":{"reasoning_content":"only thoughts"}}]}"#),
            data(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
        ]
        .concat();
        let events = adapter.feed(&mut ctx, &stream);
        let text = chunks_of(&events);
        assert_eq!(text.matches("<think>").count(), 1);
        assert_eq!(text.matches("</think>").count(), 1);
        assert!(text.ends_with("</think>\n"));
    }
}
