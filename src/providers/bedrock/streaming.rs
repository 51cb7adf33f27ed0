//! Bedrock wrapper adapter.
//!
//! Input chunks contain one or more `event{...}` JSON objects whose `bytes`
//! field is base64. Decoding yields an inner vendor frame which is
//! redispatched, with its `type` field as the event hint, to the inner
//! adapter selected once per request from the configured model's vendor
//! family. `exception{...}` objects become a single synthetic error.
//!
//! The inner adapter is owned by composition: there is no fallback lookup
//! chain, every dispatch is an explicit call.

use crate::context::RequestContext;
use crate::error::LlmError;
use crate::providers::{AdapterConfig, AnthropicAdapter, CohereAdapter, ProviderAdapter};
use crate::stream::{EventBuilder, StopSignal, StreamEvent};
use crate::utils::json_frames::next_labeled_object;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

const ENVELOPE_LABELS: &[&str] = &["event", "exception"];

#[derive(Debug, Clone, Deserialize)]
struct BedrockEventEnvelope {
    bytes: Option<String>,
}

/// Bedrock wrapper adapter; owns the inner protocol adapter.
pub struct BedrockAdapter {
    inner: Box<ProviderAdapter>,
}

impl BedrockAdapter {
    /// Resolve the inner protocol from the configured model's vendor family
    /// (`anthropic.claude-…`, `us.anthropic.…`, `cohere.command-…`).
    pub fn for_model(config: &AdapterConfig) -> Result<Self, LlmError> {
        let inner = config
            .model
            .split('.')
            .find_map(|segment| match segment {
                "anthropic" => Some(ProviderAdapter::Anthropic(AnthropicAdapter::new(config))),
                "cohere" => Some(ProviderAdapter::Cohere(CohereAdapter::new())),
                _ => None,
            })
            .ok_or_else(|| {
                LlmError::ConfigurationError(format!(
                    "unsupported bedrock model family: {}",
                    config.model
                ))
            })?;
        Ok(Self {
            inner: Box::new(inner),
        })
    }

    /// Consume a raw transport chunk; envelope framing is buffered in the
    /// context so an envelope split across chunks waits for the rest.
    pub fn feed(&self, ctx: &mut RequestContext, chunk: &str) -> Vec<StreamEvent> {
        ctx.envelope_buf.push_str(chunk);

        let mut events = Vec::new();
        loop {
            let Some((label, body, end)) = next_labeled_object(&ctx.envelope_buf, ENVELOPE_LABELS)
            else {
                break;
            };
            let body = body.to_string();
            ctx.envelope_buf.drain(..end);

            match ENVELOPE_LABELS[label] {
                "event" => events.extend(self.handle_event_envelope(ctx, &body)),
                _ => events.extend(self.handle_exception(ctx, &body)),
            }
        }
        events
    }

    /// Redispatch one already-extracted envelope body.
    pub fn handle_frame(
        &self,
        ctx: &mut RequestContext,
        hint: Option<&str>,
        data: &str,
    ) -> Vec<StreamEvent> {
        match hint {
            Some("exception") => self.handle_exception(ctx, data),
            _ => self.handle_event_envelope(ctx, data),
        }
    }

    fn handle_event_envelope(&self, ctx: &mut RequestContext, body: &str) -> Vec<StreamEvent> {
        let envelope: BedrockEventEnvelope = match serde_json::from_str(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(error = %e, "undecodable bedrock envelope, skipping");
                return Vec::new();
            }
        };
        let Some(bytes) = envelope.bytes else {
            return Vec::new();
        };

        let decoded = match BASE64.decode(bytes.as_bytes()) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "bedrock envelope bytes are not valid base64");
                return Vec::new();
            }
        };
        let payload = match String::from_utf8(decoded) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "bedrock envelope payload is not utf-8");
                return Vec::new();
            }
        };

        // the decoded frame's own type doubles as the event hint for the
        // inner protocol
        let hint = serde_json::from_str::<serde_json::Value>(&payload)
            .ok()
            .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(String::from));
        self.inner.handle_frame(ctx, hint.as_deref(), &payload)
    }

    fn handle_exception(&self, ctx: &mut RequestContext, body: &str) -> Vec<StreamEvent> {
        if !ctx.claim_stop() {
            return Vec::new();
        }
        let payload = serde_json::from_str(body)
            .unwrap_or_else(|_| serde_json::json!({ "message": body }));
        EventBuilder::new()
            .add_stop(StopSignal::error(payload))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StopReason;

    fn envelope(inner_json: &str) -> String {
        format!("event{{\"bytes\":\"{}\"}}", BASE64.encode(inner_json))
    }

    fn claude_config() -> AdapterConfig {
        AdapterConfig::new("bedrock", "us.anthropic.claude-sonnet-4-v1:0")
    }

    #[test]
    fn model_family_selects_the_inner_adapter() {
        assert!(BedrockAdapter::for_model(&claude_config()).is_ok());
        assert!(
            BedrockAdapter::for_model(&AdapterConfig::new("bedrock", "cohere.command-r-v1:0"))
                .is_ok()
        );
        assert!(
            BedrockAdapter::for_model(&AdapterConfig::new("bedrock", "amazon.titan-text-v1"))
                .is_err()
        );
    }

    #[test]
    fn envelopes_unwrap_to_inner_claude_events() {
        let adapter = BedrockAdapter::for_model(&claude_config()).unwrap();
        let mut ctx = RequestContext::new("turn");

        let stream = [
            envelope(r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#),
            envelope(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#),
            envelope(r#"{"type":"content_block_stop","index":0}"#),
            envelope(r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"}}"#),
        ]
        .concat();

        let events = adapter.feed(&mut ctx, &stream);
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hi");
        let signal = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::Stop { signal } => Some(signal),
                _ => None,
            })
            .unwrap();
        assert_eq!(signal.reason, StopReason::Complete);
    }

    #[test]
    fn envelope_split_across_chunks_waits() {
        let adapter = BedrockAdapter::for_model(&claude_config()).unwrap();
        let mut ctx = RequestContext::new("turn");

        let whole = envelope(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        );
        let (a, b) = whole.split_at(whole.len() / 2);

        assert!(adapter.feed(&mut ctx, a).is_empty());
        let events = adapter.feed(&mut ctx, b);
        assert!(
            events
                .iter()
                .any(|e| matches!(e, StreamEvent::Chunk { text } if text == "Hi"))
        );
    }

    #[test]
    fn exception_frames_are_terminal_errors() {
        let adapter = BedrockAdapter::for_model(&claude_config()).unwrap();
        let mut ctx = RequestContext::new("turn");

        let events = adapter.feed(
            &mut ctx,
            r#"exception{"message":"The security token included in the request is invalid"}"#,
        );
        let signal = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::Stop { signal } => Some(signal),
                _ => None,
            })
            .unwrap();
        assert_eq!(signal.reason, StopReason::Error);
        assert!(
            signal.error.as_ref().unwrap()["message"]
                .as_str()
                .unwrap()
                .contains("security token")
        );
    }
}
