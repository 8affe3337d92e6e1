//! External collaborators of the interpreter
//!
//! The interpreter never talks to a model or a tool runtime directly. It
//! asks a [`ChatProvider`] for generated replies and a [`ToolProvider`] for
//! callable tools. Both are async I/O boundaries and own their timeouts.
//!
//! [`ToolRegistry`] and [`CannedChatProvider`] are in-process implementations
//! used by the CLI and by tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/* ===================== Conversation Log ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One turn of the conversation log used to ground chat completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    /// Tool name for [`ChatRole::Tool`] turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    pub fn tool(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            name: Some(name.into()),
        }
    }
}

/* ===================== Errors ===================== */

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat provider failed: {0}")]
    Provider(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool failed: {0}")]
    Failed(String),
}

/* ===================== Provider Traits ===================== */

/// Generates a reply from a conversation log.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, log: &[ChatTurn]) -> Result<String, ChatError>;
}

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    String,
    Number,
    Boolean,
    StringList,
    Object,
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParameterKind,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A resolved, invokable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declared parameters; used to normalize arguments before invocation.
    fn parameters(&self) -> &[ToolParameter];

    async fn invoke(&self, args: Map<String, JsonValue>) -> Result<JsonValue, ToolError>;
}

/// Resolves `namespace.function` names to tools.
pub trait ToolProvider: Send + Sync {
    fn resolve(&self, namespace: &str, function: &str) -> Option<Arc<dyn Tool>>;
}

/* ===================== In-process Implementations ===================== */

type ToolFn = dyn Fn(Map<String, JsonValue>) -> Result<JsonValue, ToolError> + Send + Sync;

/// Tool backed by a plain closure.
pub struct FnTool {
    parameters: Vec<ToolParameter>,
    func: Box<ToolFn>,
}

impl FnTool {
    pub fn new<F>(parameters: Vec<ToolParameter>, func: F) -> Self
    where
        F: Fn(Map<String, JsonValue>) -> Result<JsonValue, ToolError> + Send + Sync + 'static,
    {
        Self {
            parameters,
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    async fn invoke(&self, args: Map<String, JsonValue>) -> Result<JsonValue, ToolError> {
        (self.func)(args)
    }
}

/// Registry of tools keyed by `namespace.function`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, namespace: &str, function: &str, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(format!("{}.{}", namespace, function), tool);
        self
    }

    /// Register a closure-backed tool.
    pub fn register_fn<F>(
        &mut self,
        namespace: &str,
        function: &str,
        parameters: Vec<ToolParameter>,
        func: F,
    ) -> &mut Self
    where
        F: Fn(Map<String, JsonValue>) -> Result<JsonValue, ToolError> + Send + Sync + 'static,
    {
        self.register(namespace, function, Arc::new(FnTool::new(parameters, func)))
    }

    /// Build a registry from fixtures: `{"namespace.function": result, ...}`.
    ///
    /// Every fixture tool ignores its arguments and returns the recorded result.
    pub fn from_fixtures(fixtures: &Map<String, JsonValue>) -> Self {
        let mut registry = Self::new();
        for (name, result) in fixtures {
            if let Some((namespace, function)) = crate::interpreter::script::split_recipient(name) {
                let result = result.clone();
                registry.register_fn(namespace, function, vec![], move |_| Ok(result.clone()));
            } else {
                tracing::warn!(name = %name, "skipping tool fixture without a namespace");
            }
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolProvider for ToolRegistry {
    fn resolve(&self, namespace: &str, function: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(&format!("{}.{}", namespace, function)).cloned()
    }
}

/// Chat provider that always answers with the same text.
#[derive(Debug, Clone)]
pub struct CannedChatProvider {
    reply: String,
}

impl CannedChatProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for CannedChatProvider {
    async fn complete(&self, _log: &[ChatTurn]) -> Result<String, ChatError> {
        Ok(self.reply.clone())
    }
}
