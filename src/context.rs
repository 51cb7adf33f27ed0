//! Per-request mutable state threaded through adapter calls.
//!
//! One [`RequestContext`] exists per in-flight stream. It is exclusively
//! owned by the request's driving closure and mutated only by that stream's
//! adapter invocations, so it carries no synchronization. Dropping it is the
//! entire cancellation story.

use crate::partial_json::PartialJsonParser;
use crate::types::{Message, MessageContent, ResponseMetadata, ToolUse, Usage};
use crate::utils::json_frames::JsonFrameBuffer;
use crate::utils::sse::SseParser;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Kind of a streamed content block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Thinking,
    RedactedThinking,
    ToolUse,
}

/// Accumulator for a tool invocation whose arguments stream in as JSON
/// fragments.
#[derive(Debug, Default)]
pub struct ToolUseBuffer {
    pub id: String,
    /// Tool name, delegated-auth prefix already stripped
    pub name: String,
    /// Raw argument JSON, append-only, possibly incomplete
    pub input_json: String,
    parser: PartialJsonParser,
    /// Best-effort progressive decode of `input_json`; always a
    /// subset-consistent prefix of the final value
    pub parsed_input: Option<serde_json::Value>,
}

impl ToolUseBuffer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append an argument fragment and refresh the progressive view.
    pub fn push_fragment(&mut self, fragment: &str) {
        self.input_json.push_str(fragment);
        let (value, _) = self.parser.feed(fragment);
        if value.is_some() {
            self.parsed_input = value;
        }
    }

    /// Decode the accumulated arguments at block stop.
    ///
    /// A stream that claims completion with invalid JSON degrades to an
    /// empty-argument call rather than aborting the turn.
    pub fn finish(&self) -> ToolUse {
        let input = if self.input_json.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&self.input_json).unwrap_or_else(|e| {
                tracing::warn!(
                    tool = %self.name,
                    error = %e,
                    "tool input never became valid JSON, substituting empty object"
                );
                serde_json::json!({})
            })
        };
        ToolUse {
            id: self.id.clone(),
            name: self.name.clone(),
            input,
        }
    }
}

/// A vendor-numbered unit of streamed output.
#[derive(Debug)]
pub struct ContentBlock {
    pub index: usize,
    pub kind: BlockKind,
    /// Accumulated text or thinking content, append-only
    pub text: String,
    /// Thinking signature deltas, kept for cache round-trips
    pub signature: String,
    pub tool_use: Option<ToolUseBuffer>,
    pub stopped: bool,
    /// Uuid of the Message emitted for this block, set once
    pub message_uuid: Uuid,
}

impl ContentBlock {
    fn new(index: usize, kind: BlockKind) -> Self {
        Self {
            index,
            kind,
            text: String::new(),
            signature: String::new(),
            tool_use: None,
            stopped: false,
            message_uuid: Uuid::new_v4(),
        }
    }
}

/// Mutable per-request accumulator.
pub struct RequestContext {
    pub turn_id: String,
    /// Streamed blocks keyed by vendor-assigned index, in index order
    pub content_blocks: BTreeMap<usize, ContentBlock>,
    pub usage: Option<Usage>,
    pub metadata: Option<ResponseMetadata>,
    /// Whether the Start event has been emitted for this request
    pub started: bool,

    /// Whether the synthetic `<think>` open marker was emitted this request
    pub returned_think_start_tag: bool,
    /// Whether the matching close marker was emitted
    pub think_tag_closed: bool,
    /// Whether the last reasoning character seen was a newline, which decides
    /// the close marker's leading newline
    pub last_think_char_newline: bool,

    /// OpenAI-style tool calls accumulated by `tool_calls[].index`
    pub tool_calls: BTreeMap<usize, ToolUseBuffer>,
    /// Gemini: a functionCall part was seen this turn, flipping `STOP` into
    /// a tool_use stop
    pub saw_function_call: bool,

    stop_emitted: bool,

    // framing scratch, owned here so chunk boundaries never leak upward
    pub(crate) sse: SseParser,
    pub(crate) json_frames: JsonFrameBuffer,
    pub(crate) envelope_buf: String,
}

impl RequestContext {
    pub fn new(turn_id: impl Into<String>) -> Self {
        Self {
            turn_id: turn_id.into(),
            content_blocks: BTreeMap::new(),
            usage: None,
            metadata: None,
            started: false,
            returned_think_start_tag: false,
            think_tag_closed: false,
            last_think_char_newline: false,
            tool_calls: BTreeMap::new(),
            saw_function_call: false,
            stop_emitted: false,
            sse: SseParser::new(),
            json_frames: JsonFrameBuffer::new(),
            envelope_buf: String::new(),
        }
    }

    /// Create the block at `index`, replacing any previous one there.
    pub fn start_block(&mut self, index: usize, kind: BlockKind) -> &mut ContentBlock {
        use std::collections::btree_map::Entry;
        match self.content_blocks.entry(index) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(ContentBlock::new(index, kind));
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(ContentBlock::new(index, kind)),
        }
    }

    pub fn block_mut(&mut self, index: usize) -> Option<&mut ContentBlock> {
        self.content_blocks.get_mut(&index)
    }

    /// Find the open block of `kind`, or create one at the next free index.
    ///
    /// Used by protocols without explicit block indices (OpenAI, Gemini,
    /// Cohere), which hold at most one open block per kind.
    pub fn ensure_block(&mut self, kind: BlockKind) -> usize {
        if let Some(block) = self
            .content_blocks
            .values()
            .find(|b| b.kind == kind && !b.stopped)
        {
            return block.index;
        }
        let index = self.next_block_index();
        self.start_block(index, kind);
        index
    }

    /// Next unused block index.
    pub fn next_block_index(&self) -> usize {
        self.content_blocks
            .keys()
            .next_back()
            .map_or(0, |last| last + 1)
    }

    /// Build the canonical Message for a block, in the block's current
    /// lifecycle state.
    pub fn message_for_block(&self, index: usize) -> Option<Message> {
        let block = self.content_blocks.get(&index)?;
        let content = match block.kind {
            BlockKind::Text => MessageContent::Text {
                text: block.text.clone(),
            },
            BlockKind::Thinking => MessageContent::Thinking {
                text: block.text.clone(),
                signature: (!block.signature.is_empty()).then(|| block.signature.clone()),
            },
            // redacted thinking stays in the block; it has no message
            BlockKind::RedactedThinking => return None,
            BlockKind::ToolUse => {
                let buffer = block.tool_use.as_ref()?;
                MessageContent::ToolUse(if block.stopped {
                    buffer.finish()
                } else {
                    ToolUse {
                        id: buffer.id.clone(),
                        name: buffer.name.clone(),
                        input: buffer
                            .parsed_input
                            .clone()
                            .unwrap_or_else(|| serde_json::json!({})),
                    }
                })
            }
        };
        let message = Message::generating(block.message_uuid, self.turn_id.clone(), content);
        Some(if block.stopped {
            message.generated()
        } else {
            message
        })
    }

    /// Tool uses from every stopped tool block, in block-index order.
    pub fn finished_tool_uses(&self) -> Vec<ToolUse> {
        self.content_blocks
            .values()
            .filter(|b| b.kind == BlockKind::ToolUse && b.stopped)
            .filter_map(|b| b.tool_use.as_ref())
            .map(ToolUseBuffer::finish)
            .collect()
    }

    /// Claim the right to emit the terminal StopSignal.
    ///
    /// Returns false if it was already claimed; callers skip the emission,
    /// which keeps `on_stop` at exactly once per request.
    pub fn claim_stop(&mut self) -> bool {
        if self.stop_emitted {
            return false;
        }
        self.stop_emitted = true;
        true
    }

    /// Whether the terminal signal has been emitted.
    pub fn stopped(&self) -> bool {
        self.stop_emitted
    }
}
