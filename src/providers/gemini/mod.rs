//! Gemini-style protocol family: streamed JSON objects carrying
//! candidates/parts.

pub mod streaming;

pub use streaming::GeminiAdapter;
