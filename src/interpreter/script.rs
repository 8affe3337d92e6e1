//! HarmonyScript program model
//!
//! A [`Script`] is carried as the JSON content of a system message with
//! `contentType = "harmony-script"`. Steps are a closed tagged variant keyed by
//! their `type` field. Deserializing a step decodes the discriminant, builds
//! the matching variant and then runs that variant's structural checks, so an
//! ill-formed step never exists as a value. Unlike envelope validation these
//! checks stop at the first violation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::types::Channel;

/// Text that counts as "no content" in an assistant message.
pub const CONTENT_SENTINEL: &str = ".";

/// Separator between plugin and function in a tool recipient.
pub const RECIPIENT_SEPARATOR: char = '.';

/* ===================== Error Types ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StepValidationError {
    #[error("extract_input: output must map at least one variable")]
    EmptyOutput,

    #[error("extract_input: output contains a blank variable name")]
    BlankOutputName,

    #[error("extract_input: expression for '{name}' is blank")]
    BlankOutputExpression { name: String },

    #[error("tool_call: recipient '{recipient}' must have the form 'plugin.function'")]
    InvalidRecipient { recipient: String },

    #[error("tool_call: channel must be 'commentary', got '{channel}'")]
    ToolChannel { channel: String },

    #[error("tool_call: save_as must name a variable")]
    BlankSaveAs,

    #[error("if: condition is blank")]
    BlankCondition,

    #[error("assistant_message: channel must be 'analysis' or 'final', got '{channel}'")]
    AssistantChannel { channel: String },

    #[error("assistant_message: only one of content and content_template may be set")]
    ConflictingContent,
}

pub type StepResult<T> = Result<T, StepValidationError>;

/* ===================== Script ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Initial variable bindings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<Map<String, JsonValue>>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { vars: None, steps }
    }

    pub fn with_vars(mut self, vars: Map<String, JsonValue>) -> Self {
        self.vars = Some(vars);
        self
    }

    /// Validate every step, recursing into branches.
    pub fn validate(&self) -> StepResult<()> {
        self.steps.iter().try_for_each(Step::validate)
    }
}

/* ===================== Steps ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "StepRepr")]
pub enum Step {
    ExtractInput(ExtractInput),
    ToolCall(ToolCall),
    If(IfStep),
    AssistantMessage(AssistantMessage),
    Halt,
}

/// Wire form of a step before structural checks.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StepRepr {
    ExtractInput(ExtractInput),
    ToolCall(ToolCall),
    If(IfStep),
    AssistantMessage(AssistantMessage),
    Halt,
}

impl TryFrom<StepRepr> for Step {
    type Error = StepValidationError;

    fn try_from(repr: StepRepr) -> StepResult<Self> {
        let step = match repr {
            StepRepr::ExtractInput(s) => Step::ExtractInput(s),
            StepRepr::ToolCall(s) => Step::ToolCall(s),
            StepRepr::If(s) => Step::If(s),
            StepRepr::AssistantMessage(s) => Step::AssistantMessage(s),
            StepRepr::Halt => Step::Halt,
        };
        // Nested branch steps were already checked when they were deserialized
        step.check()?;
        Ok(step)
    }
}

impl Step {
    /// Discriminant as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::ExtractInput(_) => "extract_input",
            Step::ToolCall(_) => "tool_call",
            Step::If(_) => "if",
            Step::AssistantMessage(_) => "assistant_message",
            Step::Halt => "halt",
        }
    }

    /// Structural checks for this step and every nested step.
    pub fn validate(&self) -> StepResult<()> {
        self.check()?;
        if let Step::If(step) = self {
            step.then_steps.iter().try_for_each(Step::validate)?;
            step.else_steps.iter().try_for_each(Step::validate)?;
        }
        Ok(())
    }

    fn check(&self) -> StepResult<()> {
        match self {
            Step::ExtractInput(s) => s.validate(),
            Step::ToolCall(s) => s.validate(),
            Step::If(s) => s.validate(),
            Step::AssistantMessage(s) => s.validate(),
            Step::Halt => Ok(()),
        }
    }
}

/// Bind variables from expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractInput {
    /// Variable name -> expression
    pub output: BTreeMap<String, String>,
}

impl ExtractInput {
    fn validate(&self) -> StepResult<()> {
        if self.output.is_empty() {
            return Err(StepValidationError::EmptyOutput);
        }
        for (name, expression) in &self.output {
            if name.trim().is_empty() {
                return Err(StepValidationError::BlankOutputName);
            }
            if expression.trim().is_empty() {
                return Err(StepValidationError::BlankOutputExpression { name: name.clone() });
            }
        }
        Ok(())
    }
}

/// Invoke a tool and store its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// `plugin.function`
    pub recipient: String,
    pub channel: String,
    #[serde(default)]
    pub args: Map<String, JsonValue>,
    pub save_as: String,
}

impl ToolCall {
    /// Split the recipient on its last separator, so dotted namespaces survive.
    pub fn split_recipient(&self) -> Option<(&str, &str)> {
        split_recipient(&self.recipient)
    }

    fn validate(&self) -> StepResult<()> {
        if self.split_recipient().is_none() {
            return Err(StepValidationError::InvalidRecipient {
                recipient: self.recipient.clone(),
            });
        }
        if self.channel != Channel::Commentary.as_str() {
            return Err(StepValidationError::ToolChannel {
                channel: self.channel.clone(),
            });
        }
        if self.save_as.trim().is_empty() {
            return Err(StepValidationError::BlankSaveAs);
        }
        Ok(())
    }
}

/// `namespace.function` -> `(namespace, function)`, both non-blank.
pub fn split_recipient(recipient: &str) -> Option<(&str, &str)> {
    let (namespace, function) = recipient.trim().rsplit_once(RECIPIENT_SEPARATOR)?;
    if namespace.trim().is_empty() || function.trim().is_empty() {
        return None;
    }
    Some((namespace, function))
}

/// Conditional branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStep {
    pub condition: String,
    #[serde(rename = "then", default)]
    pub then_steps: Vec<Step>,
    #[serde(rename = "else", default)]
    pub else_steps: Vec<Step>,
}

impl IfStep {
    fn validate(&self) -> StepResult<()> {
        if self.condition.trim().is_empty() {
            return Err(StepValidationError::BlankCondition);
        }
        Ok(())
    }
}

/// Emit assistant text on the analysis or final channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub channel: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_template: Option<String>,
}

impl AssistantMessage {
    pub fn channel(&self) -> Option<Channel> {
        match self.channel.as_str() {
            "analysis" => Some(Channel::Analysis),
            "final" => Some(Channel::Final),
            _ => None,
        }
    }

    fn validate(&self) -> StepResult<()> {
        if self.channel().is_none() {
            return Err(StepValidationError::AssistantChannel {
                channel: self.channel.clone(),
            });
        }
        let content = self.content.as_deref().is_some_and(is_material);
        let template = self.content_template.as_deref().is_some_and(is_material);
        if content && template {
            return Err(StepValidationError::ConflictingContent);
        }
        Ok(())
    }
}

/// Non-blank text other than the `"."` sentinel.
pub fn is_material(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed != CONTENT_SENTINEL
}
