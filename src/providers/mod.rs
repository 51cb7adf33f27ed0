//! Vendor protocol adapters.
//!
//! One adapter exists per wire-protocol family. Each is a synchronous state
//! machine `(context, frame, event-hint) -> events` with a byte-level `feed`
//! front door that performs framing. The set is a closed enum, selected once
//! per request from configuration; dispatch is an exhaustive match, not a
//! lookup chain.

pub mod anthropic;
pub mod bedrock;
pub mod cohere;
pub mod gemini;
pub mod openai;

use crate::context::RequestContext;
use crate::error::LlmError;
use crate::stream::StreamEvent;

pub use anthropic::AnthropicAdapter;
pub use bedrock::BedrockAdapter;
pub use cohere::CohereAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;

/// Protocol family of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Gemini,
    Cohere,
    Bedrock,
}

impl ProviderKind {
    /// Resolve a configured provider name to its protocol family.
    pub fn from_name(name: &str) -> Result<Self, LlmError> {
        match name {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "cohere" => Ok(Self::Cohere),
            "bedrock" => Ok(Self::Bedrock),
            other => Err(LlmError::ConfigurationError(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

/// Per-request adapter configuration.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Configured provider name (`anthropic`, `openai`, `gemini`, `cohere`,
    /// `bedrock`)
    pub provider: String,
    /// Model id; for Bedrock this also selects the inner protocol family
    pub model: String,
    /// Whether tool names carry the delegated-auth prefix on the wire
    pub delegated_auth: bool,
}

impl AdapterConfig {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            delegated_auth: false,
        }
    }

    pub fn with_delegated_auth(mut self, delegated_auth: bool) -> Self {
        self.delegated_auth = delegated_auth;
        self
    }
}

/// Closed set of vendor adapters.
///
/// Selected once per request; every variant implements one exhaustive
/// state-transition function over its own event vocabulary.
pub enum ProviderAdapter {
    Anthropic(AnthropicAdapter),
    OpenAi(OpenAiAdapter),
    Gemini(GeminiAdapter),
    Cohere(CohereAdapter),
    Bedrock(BedrockAdapter),
}

impl ProviderAdapter {
    /// Build the adapter for a request's configuration.
    pub fn from_config(config: &AdapterConfig) -> Result<Self, LlmError> {
        Ok(match ProviderKind::from_name(&config.provider)? {
            ProviderKind::Anthropic => Self::Anthropic(AnthropicAdapter::new(config)),
            ProviderKind::OpenAi => Self::OpenAi(OpenAiAdapter::new(config)),
            ProviderKind::Gemini => Self::Gemini(GeminiAdapter::new()),
            ProviderKind::Cohere => Self::Cohere(CohereAdapter::new()),
            ProviderKind::Bedrock => Self::Bedrock(BedrockAdapter::for_model(config)?),
        })
    }

    /// Consume a raw transport chunk, buffering partial frames in the
    /// context. Chunk boundaries may fall anywhere.
    pub fn feed(&self, ctx: &mut RequestContext, chunk: &str) -> Vec<StreamEvent> {
        match self {
            Self::Anthropic(adapter) => adapter.feed(ctx, chunk),
            Self::OpenAi(adapter) => adapter.feed(ctx, chunk),
            Self::Gemini(adapter) => adapter.feed(ctx, chunk),
            Self::Cohere(adapter) => adapter.feed(ctx, chunk),
            Self::Bedrock(adapter) => adapter.feed(ctx, chunk),
        }
    }

    /// Process one already-framed payload with an optional event hint.
    ///
    /// The Bedrock wrapper calls this directly with decoded envelope
    /// payloads, bypassing the inner protocol's transport framing.
    pub fn handle_frame(
        &self,
        ctx: &mut RequestContext,
        hint: Option<&str>,
        data: &str,
    ) -> Vec<StreamEvent> {
        match self {
            Self::Anthropic(adapter) => adapter.handle_frame(ctx, hint, data),
            Self::OpenAi(adapter) => adapter.handle_frame(ctx, hint, data),
            Self::Gemini(adapter) => adapter.handle_frame(ctx, data),
            Self::Cohere(adapter) => adapter.handle_frame(ctx, data),
            Self::Bedrock(adapter) => adapter.handle_frame(ctx, hint, data),
        }
    }
}
