//! End-to-end scenarios across the vendor adapters, driven through the
//! canonical sink the way the history/UI collaborators consume the engine.

mod support;

use support::CollectorSink;
use unistream::context::RequestContext;
use unistream::providers::{AdapterConfig, ProviderAdapter};
use unistream::stream::{StopReason, dispatch};
use unistream::types::{MessageContent, MessageState};

fn adapter_for(provider: &str, model: &str) -> ProviderAdapter {
    ProviderAdapter::from_config(&AdapterConfig::new(provider, model)).unwrap()
}

fn run(adapter: &ProviderAdapter, stream: &str) -> CollectorSink {
    let mut ctx = RequestContext::new("turn-scenario");
    let mut sink = CollectorSink::default();
    let events = adapter.feed(&mut ctx, stream);
    dispatch(&mut sink, &events);
    sink
}

#[test]
fn claude_text_scenario() {
    let adapter = adapter_for("anthropic", "claude-sonnet-4");
    let mut ctx = RequestContext::new("turn-a");
    let mut sink = CollectorSink::default();

    let frames = [
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-sonnet-4\",\"usage\":{\"input_tokens\":12,\"output_tokens\":1}}}\n\n",
        "event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hel\"}}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"lo\"}}\n\n",
        "event: content_block_stop\ndata: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
        "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":2}}\n\n",
    ];

    // deliver frame by frame, watching the lifecycle
    let mut saw_generating = false;
    for frame in frames {
        let events = adapter.feed(&mut ctx, frame);
        for message in events.iter().filter_map(|e| match e {
            unistream::stream::StreamEvent::MessagesAdd { messages } => messages.first(),
            _ => None,
        }) {
            if message.state == MessageState::Generating {
                saw_generating = true;
            }
        }
        dispatch(&mut sink, &events);
    }

    assert_eq!(sink.started, 1);
    assert_eq!(sink.start_usage.as_ref().unwrap().prompt_tokens, 12);
    assert_eq!(sink.text, "Hello");

    // exactly one message, same uuid throughout, generating before generated
    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(saw_generating);
    assert_eq!(messages[0].state, MessageState::Generated);
    assert_eq!(messages[0].text(), Some("Hello"));

    assert_eq!(sink.stops.len(), 1);
    assert_eq!(sink.stops[0].reason, StopReason::Complete);
    assert_eq!(sink.stops[0].usage.as_ref().unwrap().completion_tokens, 2);
}

#[test]
fn openai_tool_call_scenario() {
    let adapter = adapter_for("openai", "gpt-4o");
    let stream = concat!(
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"x\",\"function\":{\"name\":\"foo\",\"arguments\":\"{\\\"a\\\":1\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"}\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
    );

    let sink = run(&adapter, stream);
    assert_eq!(sink.stops.len(), 1);
    let signal = &sink.stops[0];
    assert_eq!(signal.reason, StopReason::ToolUse);
    assert_eq!(signal.tool_uses.len(), 1);
    assert_eq!(signal.tool_uses[0].name, "foo");
    assert_eq!(signal.tool_uses[0].input, serde_json::json!({"a": 1}));
}

#[test]
fn gemini_safety_block_scenario() {
    let adapter = adapter_for("gemini", "gemini-2.0-flash");
    let sink = run(&adapter, "{\"promptFeedback\":{\"blockReason\":\"SAFETY\"}}\n");

    assert_eq!(sink.stops.len(), 1);
    assert_eq!(sink.stops[0].reason, StopReason::Error);
    assert!(sink.messages().is_empty());
    assert!(sink.text.is_empty());
}

#[test]
fn cohere_text_scenario() {
    let adapter = adapter_for("cohere", "command-r-plus");
    let stream = concat!(
        "{\"event_type\":\"stream-start\"}\n",
        "{\"event_type\":\"text-generation\",\"text\":\"Bonj\"}\n",
        "{\"event_type\":\"text-generation\",\"text\":\"our\"}\n",
        "{\"event_type\":\"stream-end\",\"finish_reason\":\"COMPLETE\"}\n",
    );

    let sink = run(&adapter, stream);
    assert_eq!(sink.started, 1);
    assert_eq!(sink.text, "Bonjour");
    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].state, MessageState::Generated);
    assert_eq!(sink.stops[0].reason, StopReason::Complete);
}

#[test]
fn bedrock_unwraps_to_the_same_events_as_direct_claude() {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;

    let inner_frames = [
        r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
        r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        r#"{"type":"content_block_stop","index":0}"#,
        r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"}}"#,
    ];

    let wrapped: String = inner_frames
        .iter()
        .map(|f| format!("event{{\"bytes\":\"{}\"}}", BASE64.encode(f)))
        .collect();
    let direct: String = inner_frames
        .iter()
        .map(|f| format!("data: {f}\n\n"))
        .collect();

    let bedrock = adapter_for("bedrock", "anthropic.claude-sonnet-4-v1:0");
    let claude = adapter_for("anthropic", "claude-sonnet-4");

    let via_bedrock = support::summarize(&support::feed_one_shot(&bedrock, &wrapped));
    let via_claude = support::summarize(&support::feed_one_shot(&claude, &direct));
    assert_eq!(via_bedrock, via_claude);
}

#[test]
fn claude_thinking_tags_are_balanced() {
    let adapter = adapter_for("anthropic", "claude-sonnet-4");
    let stream = concat!(
        "event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"thinking\",\"thinking\":\"\"}}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"thinking_delta\",\"thinking\":\"weigh the options\"}}\n\n",
        "event: content_block_stop\ndata: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
        "event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":1,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":1,\"delta\":{\"type\":\"text_delta\",\"text\":\"Done\"}}\n\n",
        "event: content_block_stop\ndata: {\"type\":\"content_block_stop\",\"index\":1}\n\n",
        "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n",
    );

    let sink = run(&adapter, stream);
    assert_eq!(sink.text.matches("<think>").count(), 1);
    assert_eq!(sink.text.matches("</think>").count(), 1);
    let open = sink.text.find("<think>").unwrap();
    let close = sink.text.find("</think>").unwrap();
    let last_thinking = sink.text.find("weigh the options").unwrap();
    assert!(open < last_thinking && last_thinking < close);

    // thinking and text land in separate messages
    let messages = sink.messages();
    assert_eq!(messages.len(), 2);
    assert!(matches!(
        &messages[0].content,
        MessageContent::Thinking { text, .. } if text == "weigh the options"
    ));
    assert_eq!(messages[1].text(), Some("Done"));
}

#[test]
fn openai_thinking_tags_are_balanced() {
    let adapter = adapter_for("openai", "gpt-4o");
    let stream = concat!(
        "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"hmm\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"reasoning\":\" right\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Answer\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" here\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    let sink = run(&adapter, stream);
    assert_eq!(sink.text.matches("<think>").count(), 1);
    assert_eq!(sink.text.matches("</think>").count(), 1);
    assert_eq!(sink.text, "<think>\nhmm right\n</think>\nAnswer here");
    assert_eq!(sink.stops.len(), 1);
}

#[test]
fn broken_tool_arguments_degrade_to_empty_input() {
    let adapter = adapter_for("anthropic", "claude-sonnet-4");
    let stream = concat!(
        "event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"tool_use\",\"id\":\"t1\",\"name\":\"run\",\"input\":{}}}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"cmd\\\": \"}}\n\n",
        "event: content_block_stop\ndata: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
        "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\"}}\n\n",
    );

    let sink = run(&adapter, stream);
    assert_eq!(sink.stops[0].reason, StopReason::ToolUse);
    // decode failure at stop substitutes an empty object, never an abort
    assert_eq!(sink.stops[0].tool_uses[0].input, serde_json::json!({}));
}
