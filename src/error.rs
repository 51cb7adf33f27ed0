//! Error Handling Module
//!
//! Library-level error type for the normalization engine. Malformed vendor
//! frames are NOT errors at this level: adapters express the stream-error
//! taxonomy through canonical events (see `stream::StopSignal`), and
//! `LlmError` surfaces only at configuration boundaries and in the async
//! bridge.

use thiserror::Error;

/// Main error type for the library
#[derive(Debug, Error)]
pub enum LlmError {
    /// JSON/wire parse error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Streaming error
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Configuration error (unknown provider, unsupported model family)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Vendor-reported API error
    #[error("API error {code}: {message}")]
    ApiError {
        /// HTTP-ish status code, 0 when the vendor did not provide one
        code: u16,
        /// Error message
        message: String,
        /// Raw vendor error payload, if any
        details: Option<serde_json::Value>,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl LlmError {
    /// Create an API error with a vendor payload attached
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }
}
