//! Tests for AssistantMessage steps and the summarize fallback

use pretty_assertions::assert_eq;
use serde_json::json;

use super::helpers::{input, run, run_with, script, FailingChat, RecordingChat};
use crate::error::ErrorCode;
use crate::interpreter::{ChatRole, ChatTurn, Collaborators, Executor, ToolRegistry};

#[tokio::test]
async fn test_final_template_is_rendered() {
    let script = script(json!({
        "steps": [
            { "type": "extract_input", "output": { "name": "$input.name" } },
            { "type": "assistant_message", "channel": "final", "content_template": "Hello {{vars.name}}!" }
        ]
    }));

    let result = run(&script, input(json!({ "name": "Ada" }))).await;

    assert_eq!(result.final_text, "Hello Ada!");
}

#[tokio::test]
async fn test_final_does_not_halt_and_can_be_overwritten() {
    let script = script(json!({
        "steps": [
            { "type": "assistant_message", "channel": "final", "content": "first" },
            { "type": "extract_input", "output": { "after": "yes" } },
            { "type": "assistant_message", "channel": "final", "content": "second" }
        ]
    }));

    let result = run(&script, input(json!({}))).await;

    assert_eq!(result.final_text, "second");
    assert_eq!(result.vars.get("after"), Some(&json!("yes")));
}

#[tokio::test]
async fn test_sentinel_content_asks_chat_provider() {
    let script = script(json!({
        "steps": [
            { "type": "assistant_message", "channel": "analysis", "content": "Thinking about it." },
            { "type": "assistant_message", "channel": "final", "content": "." }
        ]
    }));
    let chat = RecordingChat::new("generated");

    let result = run_with(&script, input(json!({})), &ToolRegistry::new(), &chat).await;

    assert_eq!(result.final_text, "generated");
    let calls = chat.calls();
    assert_eq!(calls.len(), 1);
    // No summarize prompt, only the analysis turn
    assert_eq!(calls[0], vec![ChatTurn::assistant("Thinking about it.")]);
}

#[tokio::test]
async fn test_sentinel_template_wins_over_content() {
    let script = script(json!({
        "steps": [
            { "type": "assistant_message", "channel": "final", "content": "hello", "content_template": "." }
        ]
    }));
    let chat = RecordingChat::new("generated");

    let result = run_with(&script, input(json!({})), &ToolRegistry::new(), &chat).await;

    assert_eq!(result.final_text, "generated");
    assert_eq!(chat.calls().len(), 1);
}

#[tokio::test]
async fn test_analysis_is_not_surfaced() {
    let script = script(json!({
        "steps": [
            { "type": "assistant_message", "channel": "analysis", "content": "private" }
        ]
    }));
    let chat = RecordingChat::new("summary");

    let result = run_with(&script, input(json!({})), &ToolRegistry::new(), &chat).await;

    assert_eq!(result.final_text, "summary");
    let log = &chat.calls()[0];
    assert_eq!(log[0], ChatTurn::assistant("private"));
    assert_eq!(log[1].role, ChatRole::User);
    assert_eq!(log[1].content, "Summarize the results above.");
}

#[tokio::test]
async fn test_summarize_fallback_runs_exactly_once() {
    let script = script(json!({
        "steps": [ { "type": "extract_input", "output": { "x": "$input.x" } } ]
    }));
    let chat = RecordingChat::new("summary");

    let result = run_with(&script, input(json!({ "x": 1 })), &ToolRegistry::new(), &chat).await;

    assert!(result.is_ok());
    assert_eq!(result.final_text, "summary");
    assert_eq!(chat.calls().len(), 1);
}

#[tokio::test]
async fn test_no_fallback_when_final_text_set() {
    let script = script(json!({
        "steps": [ { "type": "assistant_message", "channel": "final", "content": "done" } ]
    }));
    let chat = RecordingChat::new("summary");

    let result = run_with(&script, input(json!({})), &ToolRegistry::new(), &chat).await;

    assert_eq!(result.final_text, "done");
    assert!(chat.calls().is_empty());
}

#[tokio::test]
async fn test_custom_summarize_prompt() {
    let script = script(json!({ "steps": [] }));
    let chat = RecordingChat::new("ok");
    let tools = ToolRegistry::new();

    let result = Executor::new(Collaborators::new(&chat, &tools))
        .with_summarize_prompt("Wrap up.")
        .run(&script, input(json!({})))
        .await;

    assert_eq!(result.final_text, "ok");
    assert_eq!(chat.calls()[0], vec![ChatTurn::user("Wrap up.")]);
}

#[tokio::test]
async fn test_chat_failure_is_execution_error() {
    let script = script(json!({
        "steps": [
            { "type": "extract_input", "output": { "x": "1" } },
            { "type": "assistant_message", "channel": "final", "content": "." }
        ]
    }));

    let result = run_with(&script, input(json!({})), &ToolRegistry::new(), &FailingChat).await;

    let err = result.error.clone().expect("should fail");
    assert_eq!(err.code, ErrorCode::ExecutionError);
    assert_eq!(err.details["kind"], json!("chat_failed"));
    assert_eq!(result.vars.get("x"), Some(&json!("1")));
}
