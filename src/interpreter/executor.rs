//! Step interpreter
//!
//! Walks a script depth-first with an explicit frame stack: each frame is a
//! step list plus the index of the next step to run. `If` pushes a frame for
//! the chosen branch, `Halt` drops every frame, and a frame whose steps are
//! exhausted is popped. There is no recursion and no parallelism; the only
//! suspension points are calls into the chat and tool providers.
//!
//! Cancellation is checked at the top of the loop, so a cancelled run stops
//! between steps and never leaves a step half-applied.

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::context::{ExecutionContext, VarStore};
use super::expressions::{evaluate, evaluate_condition, render_template, EXPRESSION_SENTINEL};
use super::providers::{ChatError, ChatProvider, ChatTurn, ParameterKind, ToolError, ToolParameter, ToolProvider};
use super::script::{is_material, AssistantMessage, ExtractInput, Script, Step, StepValidationError, ToolCall};
use crate::error::{ErrorCode, HrfError};
use crate::types::Channel;

/// Instruction appended before the final summarising chat call.
pub const DEFAULT_SUMMARIZE_PROMPT: &str = "Summarize the results above.";

/* ===================== Result and Errors ===================== */

/// Outcome of one run.
///
/// On failure `error` is set and `final_text` / `vars` hold whatever had
/// accumulated when the run stopped.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ExecutionResult {
    pub final_text: String,
    pub vars: Map<String, JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<HrfError>,
}

impl ExecutionResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Split into the final text or the error.
    pub fn into_result(self) -> Result<(String, Map<String, JsonValue>), HrfError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok((self.final_text, self.vars)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("invalid script: {0}")]
    InvalidScript(#[from] StepValidationError),

    #[error("invalid tool recipient '{0}'")]
    InvalidRecipient(String),

    #[error("tool '{0}' not found")]
    ToolNotFound(String),

    #[error("invalid arguments for tool '{recipient}': {message}")]
    InvalidArguments { recipient: String, message: String },

    #[error("tool '{recipient}' failed: {message}")]
    ToolFailed { recipient: String, message: String },

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("execution cancelled")]
    Cancelled,
}

impl ExecutionError {
    fn kind(&self) -> &'static str {
        match self {
            ExecutionError::InvalidScript(_) => "invalid_script",
            ExecutionError::InvalidRecipient(_) => "invalid_recipient",
            ExecutionError::ToolNotFound(_) => "tool_not_found",
            ExecutionError::InvalidArguments { .. } => "invalid_arguments",
            ExecutionError::ToolFailed { .. } => "tool_failed",
            ExecutionError::Chat(_) => "chat_failed",
            ExecutionError::Cancelled => "cancelled",
        }
    }
}

impl From<ExecutionError> for HrfError {
    fn from(err: ExecutionError) -> Self {
        HrfError::new(ErrorCode::ExecutionError, err.to_string())
            .with_details(serde_json::json!({ "kind": err.kind() }))
    }
}

/* ===================== Collaborators ===================== */

/// The two external services a run depends on.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub chat: &'a dyn ChatProvider,
    pub tools: &'a dyn ToolProvider,
}

impl<'a> Collaborators<'a> {
    pub fn new(chat: &'a dyn ChatProvider, tools: &'a dyn ToolProvider) -> Self {
        Self { chat, tools }
    }
}

/* ===================== Executor ===================== */

/// Walk control returned by each step.
enum Flow<'s> {
    Continue,
    Enter(&'s [Step]),
    Halt,
}

/// One active step list.
struct Frame<'s> {
    steps: &'s [Step],
    idx: usize,
}

/// Configured interpreter for running scripts.
pub struct Executor<'a> {
    collaborators: Collaborators<'a>,
    history: Vec<ChatTurn>,
    cancel: CancellationToken,
    summarize_prompt: String,
}

impl<'a> Executor<'a> {
    pub fn new(collaborators: Collaborators<'a>) -> Self {
        Self {
            collaborators,
            history: Vec::new(),
            cancel: CancellationToken::new(),
            summarize_prompt: DEFAULT_SUMMARIZE_PROMPT.to_string(),
        }
    }

    /// Conversation turns the log starts with.
    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_summarize_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.summarize_prompt = prompt.into();
        self
    }

    /// Run a script against the given input.
    pub async fn run(&self, script: &Script, input: Map<String, JsonValue>) -> ExecutionResult {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("execute", run_id = %run_id);
        self.run_inner(script, input).instrument(span).await
    }

    async fn run_inner(&self, script: &Script, input: Map<String, JsonValue>) -> ExecutionResult {
        let vars = script.vars.as_ref().map(VarStore::from_map).unwrap_or_default();
        let mut ctx = ExecutionContext::new(input)
            .with_vars(vars)
            .with_log(self.history.clone());

        tracing::info!(steps = script.steps.len(), "starting script");

        let outcome = match script.validate() {
            Ok(()) => self.walk(&script.steps, &mut ctx).await,
            Err(err) => Err(err.into()),
        };

        let outcome = match outcome {
            Ok(()) if ctx.final_text.trim().is_empty() => self.summarize(&mut ctx).await,
            other => other,
        };

        let error = match outcome {
            Ok(()) => {
                tracing::info!(vars = ctx.vars.len(), "script completed");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "script failed");
                Some(HrfError::from(err))
            }
        };

        ExecutionResult {
            final_text: ctx.final_text,
            vars: ctx.vars.snapshot(),
            error,
        }
    }

    /// Depth-first walk over the step tree.
    async fn walk(&self, steps: &[Step], ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        let mut frames = vec![Frame { steps, idx: 0 }];

        loop {
            if self.cancel.is_cancelled() {
                return Err(ExecutionError::Cancelled);
            }

            let Some(frame) = frames.last_mut() else {
                return Ok(());
            };

            let steps = frame.steps;
            let Some(step) = steps.get(frame.idx) else {
                frames.pop();
                continue;
            };
            frame.idx += 1;

            tracing::debug!(step = step.kind(), depth = frames.len(), "dispatching step");

            match self.dispatch(step, ctx).await? {
                Flow::Continue => {}
                Flow::Enter(branch) => frames.push(Frame {
                    steps: branch,
                    idx: 0,
                }),
                Flow::Halt => {
                    tracing::debug!("halt");
                    return Ok(());
                }
            }
        }
    }

    async fn dispatch<'s>(&self, step: &'s Step, ctx: &mut ExecutionContext) -> Result<Flow<'s>, ExecutionError> {
        match step {
            Step::ExtractInput(s) => {
                extract_input(s, ctx);
                Ok(Flow::Continue)
            }
            Step::ToolCall(s) => {
                self.tool_call(s, ctx).await?;
                Ok(Flow::Continue)
            }
            Step::If(s) => {
                let branch = if evaluate_condition(&s.condition, ctx) {
                    &s.then_steps[..]
                } else {
                    &s.else_steps[..]
                };
                Ok(Flow::Enter(branch))
            }
            Step::AssistantMessage(s) => {
                self.assistant_message(s, ctx).await?;
                Ok(Flow::Continue)
            }
            Step::Halt => Ok(Flow::Halt),
        }
    }

    async fn tool_call(&self, call: &ToolCall, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        let (namespace, function) = call
            .split_recipient()
            .ok_or_else(|| ExecutionError::InvalidRecipient(call.recipient.clone()))?;

        let mut args = Map::new();
        for (name, value) in &call.args {
            let value = match value {
                JsonValue::String(s) if s.starts_with(EXPRESSION_SENTINEL) => evaluate(s, ctx),
                other => other.clone(),
            };
            args.insert(name.clone(), value);
        }

        let tool = self
            .collaborators
            .tools
            .resolve(namespace, function)
            .ok_or_else(|| ExecutionError::ToolNotFound(call.recipient.clone()))?;

        normalize_arguments(tool.parameters(), &mut args);

        tracing::debug!(recipient = %call.recipient, "invoking tool");
        let result = tool.invoke(args).await.map_err(|err| match err {
            ToolError::InvalidArguments(message) => ExecutionError::InvalidArguments {
                recipient: call.recipient.clone(),
                message,
            },
            ToolError::Failed(message) => ExecutionError::ToolFailed {
                recipient: call.recipient.clone(),
                message,
            },
        })?;

        ctx.log.push(ChatTurn::tool(&call.recipient, result.to_string()));
        ctx.vars.set(&call.save_as, result);
        Ok(())
    }

    async fn assistant_message(&self, message: &AssistantMessage, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        // A present template always wins over literal content
        let text = match (message.content_template.as_deref(), message.content.as_deref()) {
            (Some(template), _) => render_template(template, ctx),
            (None, Some(content)) => content.to_string(),
            (None, None) => String::new(),
        };

        match message.channel() {
            Some(Channel::Final) => {
                if is_material(&text) {
                    ctx.final_text = text;
                } else {
                    tracing::debug!("final message has no text, asking chat provider");
                    ctx.final_text = self.collaborators.chat.complete(&ctx.log).await?;
                }
            }
            // Analysis text grounds later chat calls and is never surfaced
            _ => {
                if !text.trim().is_empty() {
                    ctx.log.push(ChatTurn::assistant(text));
                }
            }
        }

        Ok(())
    }

    async fn summarize(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        tracing::debug!("no final text, summarizing");
        ctx.log.push(ChatTurn::user(self.summarize_prompt.clone()));
        ctx.final_text = self.collaborators.chat.complete(&ctx.log).await?;
        Ok(())
    }
}

/// Bind every output against the same pre-step context.
fn extract_input(step: &ExtractInput, ctx: &mut ExecutionContext) {
    let before: &ExecutionContext = ctx;
    let bound: Vec<(&String, JsonValue)> = step
        .output
        .iter()
        .map(|(name, expression)| (name, evaluate(expression, before)))
        .collect();

    for (name, value) in bound {
        ctx.vars.set(name, value);
    }
}

/// Split a comma-separated string into a list for string-list parameters.
fn normalize_arguments(parameters: &[ToolParameter], args: &mut Map<String, JsonValue>) {
    for parameter in parameters {
        if parameter.kind != ParameterKind::StringList {
            continue;
        }
        if let Some(JsonValue::String(joined)) = args.get(&parameter.name) {
            let items = joined
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| JsonValue::String(item.to_string()))
                .collect();
            args.insert(parameter.name.clone(), JsonValue::Array(items));
        }
    }
}

/// Run a script with default executor settings.
pub async fn execute(
    script: &Script,
    input: Map<String, JsonValue>,
    collaborators: Collaborators<'_>,
) -> ExecutionResult {
    Executor::new(collaborators).run(script, input).await
}
