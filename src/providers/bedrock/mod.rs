//! Bedrock wrapper: base64 event envelopes around an inner vendor protocol.

pub mod streaming;

pub use streaming::BedrockAdapter;
