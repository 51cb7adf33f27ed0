//! # unistream
//!
//! Streaming-response normalization for multi-provider LLM APIs.
//!
//! Heterogeneous vendors stream chat completions with different framings
//! (SSE, newline-delimited JSON, base64 event envelopes), different block
//! models (indexed content blocks, flat deltas, candidates/parts, typed
//! events) and different stop-reason vocabularies. This crate reduces all of
//! them to one canonical event sequence suitable for history storage and
//! live UI rendering:
//!
//! - [`providers::ProviderAdapter`] — closed set of per-vendor state
//!   machines, selected once per request
//! - [`context::RequestContext`] — per-request accumulator threaded through
//!   adapter calls
//! - [`stream::StreamEvent`] / [`stream::StreamSink`] — the canonical
//!   contract
//! - [`partial_json::PartialJsonParser`] — restartable parser revealing
//!   tool-call arguments before the stream finishes sending them
//!
//! Adapters are synchronous, sans-io and allocation-light: the transport
//! collaborator feeds raw text chunks in delivery order and forwards the
//! returned events. Chunk boundaries may fall anywhere, including mid-JSON
//! and mid-escape; framing buffers inside the context absorb them.
//!
//! ```
//! use unistream::context::RequestContext;
//! use unistream::providers::{AdapterConfig, ProviderAdapter};
//! use unistream::stream::StreamEvent;
//!
//! let config = AdapterConfig::new("anthropic", "claude-sonnet-4");
//! let adapter = ProviderAdapter::from_config(&config).unwrap();
//! let mut ctx = RequestContext::new("turn-1");
//!
//! let chunk = "event: message_start\ndata: {\"type\":\"message_start\",\
//!     \"message\":{\"id\":\"msg_1\",\"usage\":{\"input_tokens\":3}}}\n\n";
//! for event in adapter.feed(&mut ctx, chunk) {
//!     if let StreamEvent::Start { usage } = event {
//!         assert_eq!(usage.unwrap().prompt_tokens, 3);
//!     }
//! }
//! ```

pub mod context;
pub mod error;
pub mod partial_json;
pub mod providers;
pub mod stream;
pub mod types;
pub mod utils;

/// Commonly used types, one import away.
pub mod prelude {
    pub use crate::context::{BlockKind, ContentBlock, RequestContext, ToolUseBuffer};
    pub use crate::error::LlmError;
    pub use crate::partial_json::PartialJsonParser;
    pub use crate::providers::{AdapterConfig, ProviderAdapter, ProviderKind};
    pub use crate::stream::{
        EventBuilder, StopReason, StopSignal, StreamEvent, StreamSink, dispatch,
    };
    pub use crate::types::{
        Message, MessageContent, MessageRole, MessageState, ToolUse, Usage,
    };
    pub use crate::utils::streaming::{EventStream, normalize_chunks};
}
