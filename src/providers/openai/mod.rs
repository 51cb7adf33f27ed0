//! OpenAI-style protocol family: SSE-framed flat deltas with a single
//! implicit content block and index-keyed tool calls.

pub mod streaming;
pub mod transformers;

pub use streaming::OpenAiAdapter;
