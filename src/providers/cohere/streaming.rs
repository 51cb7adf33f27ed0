//! Cohere-style streaming adapter.
//!
//! Newline-delimited JSON objects, each tagged with an `event_type`:
//! `stream-start`, `text-generation`, `tool-calls-generation`,
//! `citation-generation`, `stream-end`. Tool calls arrive whole, never
//! fragmented; `stream-end` carries the finish reason and billing.

use crate::context::{BlockKind, RequestContext, ToolUseBuffer};
use crate::stream::{EventBuilder, StopSignal, StreamEvent};
use crate::types::Usage;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
struct CohereStreamEvent {
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<CohereToolCall>>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    response: Option<CohereResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct CohereToolCall {
    name: String,
    #[serde(default)]
    parameters: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct CohereResponse {
    meta: Option<CohereMeta>,
}

#[derive(Debug, Clone, Deserialize)]
struct CohereMeta {
    billed_units: Option<CohereBilledUnits>,
}

#[derive(Debug, Clone, Deserialize)]
struct CohereBilledUnits {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

/// Cohere-style adapter
#[derive(Default)]
pub struct CohereAdapter;

impl CohereAdapter {
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

    /// Process one typed event object.
    pub fn handle_frame(&self, ctx: &mut RequestContext, data: &str) -> Vec<StreamEvent> {
        if data.trim().is_empty() {
            return Vec::new();
        }

        tracing::debug!(data, "cohere frame");
        let event: CohereStreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(error = %e, "undecodable cohere frame, waiting for more input");
                return Vec::new();
            }
        };

        match event.event_type.as_str() {
            "stream-start" => {
                if ctx.started {
                    return Vec::new();
                }
                ctx.started = true;
                EventBuilder::new().add_start(None).build()
            }
            "text-generation" => {
                let Some(text) = event.text.as_deref().filter(|t| !t.is_empty()) else {
                    return Vec::new();
                };
                let index = ctx.ensure_block(BlockKind::Text);
                if let Some(block) = ctx.block_mut(index) {
                    block.text.push_str(text);
                }
                let mut builder = EventBuilder::new().add_chunk(text.to_string());
                if let Some(message) = ctx.message_for_block(index) {
                    builder = builder.add_message(message);
                }
                builder.build()
            }
            "tool-calls-generation" => {
                let Some(tool_calls) = &event.tool_calls else {
                    return Vec::new();
                };
                let mut builder = EventBuilder::new();
                for tool_call in tool_calls {
                    let index = ctx.next_block_index();
                    let block = ctx.start_block(index, BlockKind::ToolUse);
                    let mut buffer =
                        ToolUseBuffer::new(Uuid::new_v4().to_string(), tool_call.name.clone());
                    buffer.input_json = tool_call.parameters.to_string();
                    buffer.parsed_input = Some(tool_call.parameters.clone());
                    block.tool_use = Some(buffer);
                    block.stopped = true;
                    if let Some(message) = ctx.message_for_block(index) {
                        builder = builder.add_message(message);
                    }
                }
                builder.build()
            }
            "stream-end" => self.on_stream_end(ctx, &event),
            "citation-generation" => Vec::new(),
            other => {
                tracing::debug!(event_type = other, "ignoring unknown cohere event");
                Vec::new()
            }
        }
    }

    fn on_stream_end(&self, ctx: &mut RequestContext, event: &CohereStreamEvent) -> Vec<StreamEvent> {
        if !ctx.claim_stop() {
            return Vec::new();
        }

        if let Some(billed) = event
            .response
            .as_ref()
            .and_then(|r| r.meta.as_ref())
            .and_then(|m| m.billed_units.as_ref())
        {
            ctx.usage = Some(Usage::new(
                billed.input_tokens.unwrap_or(0),
                billed.output_tokens.unwrap_or(0),
            ));
        }

        // finalize the text block before the terminal signal
        let mut builder = EventBuilder::new();
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

        let usage = ctx.usage.clone();
        let finish_reason = event.finish_reason.as_deref().unwrap_or("");
        let tool_uses = ctx.finished_tool_uses();
        let signal = match finish_reason {
            "COMPLETE" if !tool_uses.is_empty() => StopSignal::tool_use(usage, tool_uses),
            "COMPLETE" => StopSignal::complete(usage),
            "MAX_TOKENS" => StopSignal::max_tokens(usage),
            "ERROR" | "ERROR_TOXIC" | "ERROR_LIMIT" => StopSignal {
                usage,
                ..StopSignal::error(serde_json::json!({ "finish_reason": finish_reason }))
            },
            other => {
                tracing::warn!(finish_reason = other, "unknown cohere finish reason");
                StopSignal {
                    usage,
                    ..StopSignal::error(serde_json::json!({ "finish_reason": other }))
                }
            }
        };
        builder.add_stop(signal).build()
    }
}
