//! Tests for cooperative cancellation

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::helpers::{input, script, RecordingChat};
use crate::interpreter::{Collaborators, Executor, ToolRegistry};

#[tokio::test]
async fn test_cancelled_before_start() {
    let script = script(json!({
        "steps": [ { "type": "extract_input", "output": { "x": "1" } } ]
    }));
    let chat = RecordingChat::new("summary");
    let token = CancellationToken::new();
    token.cancel();

    let tools = ToolRegistry::new();

    let result = Executor::new(Collaborators::new(&chat, &tools))
        .with_cancellation(token)
        .run(&script, input(json!({})))
        .await;

    let err = result.error.expect("should be cancelled");
    assert_eq!(err.details["kind"], json!("cancelled"));
    assert!(result.vars.is_empty());
    assert!(chat.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_between_steps_keeps_applied_steps() {
    let token = CancellationToken::new();
    let mut tools = ToolRegistry::new();
    let trigger = token.clone();
    tools.register_fn("control", "stop", vec![], move |_| {
        trigger.cancel();
        Ok(json!("stopping"))
    });

    let script = script(json!({
        "steps": [
            { "type": "extract_input", "output": { "a": "1" } },
            { "type": "tool_call", "recipient": "control.stop", "channel": "commentary", "save_as": "stop" },
            { "type": "extract_input", "output": { "b": "2" } }
        ]
    }));
    let chat = RecordingChat::new("summary");

    let result = Executor::new(Collaborators::new(&chat, &tools))
        .with_cancellation(token)
        .run(&script, input(json!({})))
        .await;

    assert!(!result.is_ok());
    assert_eq!(result.vars.get("a"), Some(&json!("1")));
    assert_eq!(result.vars.get("stop"), Some(&json!("stopping")));
    assert!(result.vars.get("b").is_none());
}
