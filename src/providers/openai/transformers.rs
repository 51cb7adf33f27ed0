//! Request shaping for OpenAI-style endpoints.
//!
//! Reasoning-capable model families reject the usual sampling parameters and
//! rename the output budget field. This is a request-side rule, but it lives
//! with the adapter because both sides of the wire are conditional on the
//! same model family.

use once_cell::sync::Lazy;
use regex::Regex;

/// Model names that route to the reasoning endpoint behavior (o1/o3/o4…,
/// gpt-5 family).
static REASONING_MODEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(o\d|gpt-5)").expect("reasoning model pattern is valid"));

pub fn is_reasoning_model(model: &str) -> bool {
    REASONING_MODEL_RE.is_match(model)
}

/// Adjust an outbound chat request body for the target model.
///
/// For reasoning models: `temperature` is pinned to 1 (the only accepted
/// value), `max_tokens` migrates to `max_completion_tokens`, and sampling
/// parameters the endpoint rejects are dropped.
pub fn shape_chat_request(body: &mut serde_json::Value, model: &str) {
    if !is_reasoning_model(model) {
        return;
    }
    let Some(obj) = body.as_object_mut() else {
        return;
    };

    obj.insert("temperature".to_string(), serde_json::json!(1));
    if let Some(max_tokens) = obj.remove("max_tokens") {
        obj.entry("max_completion_tokens").or_insert(max_tokens);
    }
    for rejected in ["top_p", "presence_penalty", "frequency_penalty"] {
        obj.remove(rejected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reasoning_model_pattern() {
        assert!(is_reasoning_model("o1-mini"));
        assert!(is_reasoning_model("o3"));
        assert!(is_reasoning_model("gpt-5-codex"));
        assert!(!is_reasoning_model("gpt-4o"));
        assert!(!is_reasoning_model("omega-7b"));
    }

    #[test]
    fn shaping_rewrites_reasoning_requests() {
        let mut body = json!({
            "model": "o3",
            "temperature": 0.2,
            "top_p": 0.9,
            "max_tokens": 4096,
        });
        shape_chat_request(&mut body, "o3");
        assert_eq!(body["temperature"], 1);
        assert_eq!(body["max_completion_tokens"], 4096);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn shaping_leaves_other_models_alone() {
        let mut body = json!({"model": "gpt-4o", "temperature": 0.2});
        let before = body.clone();
        shape_chat_request(&mut body, "gpt-4o");
        assert_eq!(body, before);
    }
}
