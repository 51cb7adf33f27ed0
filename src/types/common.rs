//! Common metadata types used across the adapters.

use serde::{Deserialize, Serialize};

/// Token usage statistics for one in-flight request.
///
/// Populated from whatever accounting the vendor streams: Claude-style
/// `message_start`/`message_delta` usage, OpenAI `stream_options` usage
/// chunks, Gemini `usageMetadata`, Cohere `billed_units`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    /// Input tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Output tokens generated so far
    pub completion_tokens: u32,
    /// Total tokens used
    pub total_tokens: u32,
    /// Tokens served from or written to the vendor's prompt cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_tokens: Option<u32>,
    /// Tokens spent on internal reasoning, when reported separately
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
}

impl Usage {
    /// Build a usage record from prompt/completion counts, deriving the total.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cached_tokens: None,
            reasoning_tokens: None,
        }
    }

    /// Replace the completion count and re-derive the total.
    ///
    /// Vendors that stream usage incrementally (Claude `message_delta`) send
    /// the cumulative output count, so this is a replace, not an add.
    pub fn set_completion_tokens(&mut self, completion_tokens: u32) {
        self.completion_tokens = completion_tokens;
        self.total_tokens = self.prompt_tokens + completion_tokens;
    }
}

/// Response metadata surfaced at stream start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Response ID
    pub id: Option<String>,
    /// Model name
    pub model: Option<String>,
    /// Creation time
    pub created: Option<chrono::DateTime<chrono::Utc>>,
    /// Provider name
    pub provider: String,
}
