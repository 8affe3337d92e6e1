//! Test helpers for interpreter tests
//!
//! Scripts are written as JSON and go through serde, so every test also
//! exercises step deserialization.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::interpreter::{ChatError, ChatProvider, ChatTurn, Collaborators, ExecutionResult, Executor, Script, ToolRegistry};

/// Deserialize a script, panicking on invalid JSON or steps.
pub fn script(value: JsonValue) -> Script {
    serde_json::from_value(value).expect("Script deserialization failed")
}

/// Object literal to input map.
pub fn input(value: JsonValue) -> Map<String, JsonValue> {
    value.as_object().cloned().expect("input must be an object")
}

/// Chat provider that replies with a fixed text and records every log it saw.
pub struct RecordingChat {
    reply: String,
    calls: Mutex<Vec<Vec<ChatTurn>>>,
}

impl RecordingChat {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<ChatTurn>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for RecordingChat {
    async fn complete(&self, log: &[ChatTurn]) -> Result<String, ChatError> {
        self.calls.lock().unwrap().push(log.to_vec());
        Ok(self.reply.clone())
    }
}

/// Chat provider that always fails.
pub struct FailingChat;

#[async_trait]
impl ChatProvider for FailingChat {
    async fn complete(&self, _log: &[ChatTurn]) -> Result<String, ChatError> {
        Err(ChatError::Provider("model unavailable".to_string()))
    }
}

/// Run a script with the given tools and chat provider.
pub async fn run_with(
    script: &Script,
    input: Map<String, JsonValue>,
    tools: &ToolRegistry,
    chat: &dyn ChatProvider,
) -> ExecutionResult {
    Executor::new(Collaborators::new(chat, tools)).run(script, input).await
}

/// Run a script with no tools and a chat provider that answers "summary".
pub async fn run(script: &Script, input: Map<String, JsonValue>) -> ExecutionResult {
    let chat = RecordingChat::new("summary");
    run_with(script, input, &ToolRegistry::new(), &chat).await
}
