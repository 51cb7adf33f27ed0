//! Claude-style protocol family: SSE-framed, vendor-indexed content blocks.

pub mod streaming;

pub use streaming::AnthropicAdapter;
