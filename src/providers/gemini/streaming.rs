//! Gemini-style streaming adapter.
//!
//! Each frame is a complete JSON object, not SSE-framed: the context's
//! balanced-JSON buffer re-frames arbitrary chunk boundaries.
//! `candidates[0].content.parts[]` is processed in array order, each part
//! chunked/emitted immediately; `finishReason` drives the terminal signal,
//! and `promptFeedback.blockReason` with no candidates is an immediate
//! error, independent of the per-candidate path.

use crate::context::{BlockKind, RequestContext, ToolUseBuffer};
use crate::stream::{EventBuilder, StopSignal, StreamEvent};
use crate::types::Usage;
use serde::Deserialize;
use uuid::Uuid;

pub const THINK_OPEN: &str = "<think>\n";

#[derive(Debug, Clone, Deserialize)]
struct GeminiStreamResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiPart {
    text: Option<String>,
    /// Whether this part is a thought summary (thinking models)
    thought: Option<bool>,
    #[serde(rename = "functionCall")]
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u32>,
    #[serde(rename = "thoughtsTokenCount")]
    thoughts_token_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiPromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GeminiUsageMetadata {
    fn to_usage(&self) -> Usage {
        let prompt = self.prompt_token_count.unwrap_or(0);
        let completion = self.candidates_token_count.unwrap_or(0);
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: self.total_token_count.unwrap_or(prompt + completion),
            cached_tokens: None,
            reasoning_tokens: self.thoughts_token_count,
        }
    }
}

/// Gemini-style adapter
#[derive(Default)]
pub struct GeminiAdapter;

impl GeminiAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Consume a raw transport chunk; JSON object framing is buffered in the
    /// context.
    pub fn feed(&self, ctx: &mut RequestContext, chunk: &str) -> Vec<StreamEvent> {
        let frames = ctx.json_frames.feed(chunk);
        let mut events = Vec::new();
        for frame in frames {
            events.extend(self.handle_frame(ctx, &frame));
        }
        events
    }

    /// Process one complete JSON response object.
    pub fn handle_frame(&self, ctx: &mut RequestContext, data: &str) -> Vec<StreamEvent> {
        if data.trim().is_empty() {
            return Vec::new();
        }

        tracing::debug!(data, "gemini frame");
        let response: GeminiStreamResponse = match serde_json::from_str(data) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "undecodable gemini frame, waiting for more input");
                return Vec::new();
            }
        };

        let mut builder = EventBuilder::new();
        if !ctx.started {
            ctx.started = true;
            builder = builder.add_start(None);
        }

        if let Some(usage) = &response.usage_metadata {
            ctx.usage = Some(usage.to_usage());
        }

        // prompt-level block: terminal error regardless of candidates
        let no_candidates = response
            .candidates
            .as_ref()
            .is_none_or(|candidates| candidates.is_empty());
        if let Some(feedback) = &response.prompt_feedback
            && let Some(block_reason) = &feedback.block_reason
            && no_candidates
        {
            if !ctx.claim_stop() {
                return Vec::new();
            }
            return builder
                .add_stop(StopSignal::error(
                    serde_json::json!({ "blockReason": block_reason }),
                ))
                .build();
        }

        let Some(candidate) = response.candidates.as_ref().and_then(|c| c.first()) else {
            return builder.build();
        };

        if let Some(parts) = candidate.content.as_ref().and_then(|c| c.parts.as_ref()) {
            for part in parts {
                builder = self.handle_part(ctx, builder, part);
            }
        }

        if let Some(finish_reason) = candidate.finish_reason.as_deref() {
            builder = self.on_finish(ctx, builder, finish_reason);
        }

        builder.build()
    }

    fn handle_part(
        &self,
        ctx: &mut RequestContext,
        mut builder: EventBuilder,
        part: &GeminiPart,
    ) -> EventBuilder {
        if let Some(function_call) = &part.function_call {
            ctx.saw_function_call = true;
            let index = ctx.next_block_index();
            let block = ctx.start_block(index, BlockKind::ToolUse);
            let mut buffer =
                ToolUseBuffer::new(Uuid::new_v4().to_string(), function_call.name.clone());
            buffer.input_json = function_call.args.to_string();
            buffer.parsed_input = Some(function_call.args.clone());
            block.tool_use = Some(buffer);
            // arguments arrive whole, the block opens and closes in one step
            block.stopped = true;
            if let Some(message) = ctx.message_for_block(index) {
                builder = builder.add_message(message);
            }
            return builder;
        }

        let Some(text) = part.text.as_deref().filter(|t| !t.is_empty()) else {
            return builder;
        };

        if part.thought.unwrap_or(false) {
            if !ctx.returned_think_start_tag {
                ctx.returned_think_start_tag = true;
                builder = builder.add_chunk(THINK_OPEN);
            }
            ctx.last_think_char_newline = text.ends_with('\n');
            let index = ctx.ensure_block(BlockKind::Thinking);
            if let Some(block) = ctx.block_mut(index) {
                block.text.push_str(text);
            }
            builder = builder.add_chunk(text.to_string());
            if let Some(message) = ctx.message_for_block(index) {
                builder = builder.add_message(message);
            }
        } else {
            builder = self.close_think_tag(ctx, builder);
            let index = ctx.ensure_block(BlockKind::Text);
            if let Some(block) = ctx.block_mut(index) {
                block.text.push_str(text);
            }
            builder = builder.add_chunk(text.to_string());
            if let Some(message) = ctx.message_for_block(index) {
                builder = builder.add_message(message);
            }
        }
        builder
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
        let builder = self.finish_open_blocks(ctx, builder);
        let usage = ctx.usage.clone();

        let signal = match finish_reason {
            "STOP" if ctx.saw_function_call => {
                StopSignal::tool_use(usage, ctx.finished_tool_uses())
            }
            "STOP" => StopSignal::complete(usage),
            "MAX_TOKENS" => StopSignal::max_tokens(usage),
            "TOOL_CODE" | "TOOL_CODE_EXECUTING" => {
                StopSignal::tool_use(usage, ctx.finished_tool_uses())
            }
            "SAFETY" | "RECITATION" => StopSignal {
                usage,
                ..StopSignal::error(serde_json::json!({ "finishReason": finish_reason }))
            },
            other => {
                tracing::warn!(finish_reason = other, "unknown gemini finish reason");
                StopSignal {
                    usage,
                    ..StopSignal::error(serde_json::json!({ "finishReason": other }))
                }
            }
        };
        builder.add_stop(signal)
    }

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
        builder.add_chunk(close)
    }

    /// Mark the open text/thinking blocks generated at stream end.
    fn finish_open_blocks(&self, ctx: &mut RequestContext, mut builder: EventBuilder) -> EventBuilder {
        let open: Vec<usize> = ctx
            .content_blocks
            .values()
            .filter(|b| !b.stopped)
            .map(|b| b.index)
            .collect();
        for index in open {
            if let Some(block) = ctx.block_mut(index) {
                block.stopped = true;
            }
            if let Some(message) = ctx.message_for_block(index) {
                builder = builder.add_message(message);
            }
        }
        builder
    }
}
