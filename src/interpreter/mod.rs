//! HarmonyScript interpreter
//!
//! - `script`: step types and per-step validation
//! - `expressions`: `$vars` / `$input` paths, `$len`, `$map`, conditions, templates
//! - `context`: variables, input and conversation log of one run
//! - `providers`: chat and tool collaborators
//! - `executor`: the step walker
//!
//! [`run_envelope`] ties these to the validator: an envelope is validated,
//! its script extracted and its plain messages used to seed the log.

pub mod context;
pub mod executor;
pub mod expressions;
pub mod providers;
pub mod script;

pub use context::{ExecutionContext, VarStore};
pub use executor::{execute, Collaborators, ExecutionError, ExecutionResult, Executor, DEFAULT_SUMMARIZE_PROMPT};
pub use providers::{
    CannedChatProvider, ChatError, ChatProvider, ChatRole, ChatTurn, FnTool, ParameterKind, Tool, ToolError,
    ToolParameter, ToolProvider, ToolRegistry,
};
pub use script::{AssistantMessage, ExtractInput, IfStep, Script, Step, StepValidationError, ToolCall};

use serde_json::{Map, Value as JsonValue};

use crate::error::{ErrorCode, HrfError};
use crate::parser::semantic_validator::Validator;
use crate::schema::SchemaValidator;
use crate::types::{Envelope, Message, ROLE_ASSISTANT, ROLE_DEVELOPER, ROLE_SYSTEM, ROLE_USER};

/// Conversation turns for every message of the envelope except its script.
pub fn conversation_log(envelope: &Envelope) -> Vec<ChatTurn> {
    let script_index = envelope.script_message().map(|(index, _)| index);

    envelope
        .messages
        .iter()
        .enumerate()
        .filter(|(index, _)| Some(*index) != script_index)
        .map(|(_, message)| chat_turn(message))
        .collect()
}

fn chat_turn(message: &Message) -> ChatTurn {
    let content = match &message.content {
        JsonValue::String(text) => text.clone(),
        other => other.to_string(),
    };

    let role = message.role.to_ascii_lowercase();
    match role.as_str() {
        ROLE_SYSTEM | ROLE_DEVELOPER => ChatTurn::system(content),
        ROLE_USER => ChatTurn::user(content),
        ROLE_ASSISTANT => ChatTurn::assistant(content),
        _ => ChatTurn::tool(message.role.clone(), content),
    }
}

/// Validate an envelope and run its embedded script.
///
/// Validation failures are returned as `Err`. Once execution starts the
/// outcome, including any execution error, is carried by the result.
pub async fn run_envelope(
    envelope: &Envelope,
    input: Map<String, JsonValue>,
    schema: &dyn SchemaValidator,
    validator: &Validator,
    executor: Executor<'_>,
) -> Result<ExecutionResult, HrfError> {
    if let Some(err) = validator.validate_for_hrf(envelope, schema) {
        return Err(err);
    }

    let script = envelope
        .script()
        .map_err(|err| HrfError::new(ErrorCode::SchemaScriptFailed, format!("invalid script: {}", err)))?
        .ok_or_else(|| HrfError::new(ErrorCode::ExecutionError, "envelope carries no harmony-script message"))?;

    let executor = executor.with_history(conversation_log(envelope));
    Ok(executor.run(&script, input).await)
}

#[cfg(test)]
mod tests;
