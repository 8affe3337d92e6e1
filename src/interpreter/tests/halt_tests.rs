//! Tests for Halt steps

use pretty_assertions::assert_eq;
use serde_json::json;

use super::helpers::{input, run, run_with, script, RecordingChat};
use crate::interpreter::ToolRegistry;

#[tokio::test]
async fn test_halt_inside_branch_stops_whole_script() {
    let script = script(json!({
        "steps": [
            { "type": "assistant_message", "channel": "final", "content": "early" },
            { "type": "if", "condition": "$input.stop", "then": [
                { "type": "if", "condition": "$input.stop", "then": [ { "type": "halt" } ] },
                { "type": "extract_input", "output": { "inner": "ran" } }
            ] },
            { "type": "extract_input", "output": { "outer": "ran" } },
            { "type": "assistant_message", "channel": "final", "content": "late" }
        ]
    }));

    let result = run(&script, input(json!({ "stop": true }))).await;

    assert!(result.is_ok());
    assert_eq!(result.final_text, "early");
    assert!(result.vars.is_empty());
}

#[tokio::test]
async fn test_halt_without_final_text_still_summarizes() {
    let script = script(json!({ "steps": [ { "type": "halt" } ] }));
    let chat = RecordingChat::new("summary");

    let result = run_with(&script, input(json!({})), &ToolRegistry::new(), &chat).await;

    assert_eq!(result.final_text, "summary");
    assert_eq!(chat.calls().len(), 1);
}
