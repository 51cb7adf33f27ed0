//! Canonical message model emitted to the history/UI collaborators.
//!
//! One `Message` exists per streamed content block and is re-emitted (same
//! uuid) on every delta; consumers replace by uuid. The lifecycle moves from
//! `Generating` to `Generated` exactly once, at block stop.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed literal prepended to tool names when operating under delegated auth.
///
/// Outbound tool definitions get the prefix; every inbound tool_use name is
/// stripped before it reaches a canonical [`Message`]. Stripping a
/// non-prefixed name is a no-op, so the transform is idempotent both ways.
pub const DELEGATED_TOOL_NAME_PREFIX: &str = "mcp__";

/// Prefix a tool name for the delegated-auth outbound transform.
pub fn prefix_delegated(name: &str) -> String {
    if name.starts_with(DELEGATED_TOOL_NAME_PREFIX) {
        name.to_string()
    } else {
        format!("{DELEGATED_TOOL_NAME_PREFIX}{name}")
    }
}

/// Strip the delegated-auth prefix from an inbound tool name.
pub fn strip_delegated(name: &str) -> &str {
    name.strip_prefix(DELEGATED_TOOL_NAME_PREFIX).unwrap_or(name)
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Message lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    /// Content is still streaming in
    Generating,
    /// The content block backing this message has stopped
    Generated,
}

/// A model-initiated request to invoke an external function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    /// Vendor-assigned invocation id (synthesized when the vendor has none)
    pub id: String,
    /// Tool name, delegated-auth prefix already stripped
    pub name: String,
    /// Decoded arguments; `{}` when the streamed JSON never became valid
    pub input: serde_json::Value,
}

/// One variant of message content.
///
/// The engine emits `Text`, `Thinking` and `ToolUse`; `ToolResult` and
/// `Image` exist for the history collaborator, which stores tool outcomes and
/// attachments in the same model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Thinking {
        text: String,
        /// Vendor signature over the thinking content, kept for cache
        /// round-trips, never rendered
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    ToolUse(ToolUse),
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
    Image {
        media_type: String,
        data: String,
    },
}

/// Canonical message, replace-by-uuid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub uuid: Uuid,
    /// Back-reference to the request turn this message belongs to
    pub turn_id: String,
    pub role: MessageRole,
    pub content: MessageContent,
    pub state: MessageState,
    pub created: chrono::DateTime<chrono::Utc>,
}

impl Message {
    /// Create a new assistant message in `Generating` state.
    pub fn generating(uuid: Uuid, turn_id: impl Into<String>, content: MessageContent) -> Self {
        Self {
            uuid,
            turn_id: turn_id.into(),
            role: MessageRole::Assistant,
            content,
            state: MessageState::Generating,
            created: chrono::Utc::now(),
        }
    }

    /// Mark the message generated.
    pub fn generated(mut self) -> Self {
        self.state = MessageState::Generated;
        self
    }

    /// Extract the text of a `Text` message, if that is what this is.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Extract the tool use payload, if that is what this is.
    pub fn tool_use(&self) -> Option<&ToolUse> {
        match &self.content {
            MessageContent::ToolUse(tool_use) => Some(tool_use),
            _ => None,
        }
    }
}
