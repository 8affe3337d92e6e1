//! Harmony Response Format data model
//!
//! An [`Envelope`] is an ordered list of [`Message`]s plus a version tag. The
//! same types are produced by the wire-text parser and by plain JSON
//! deserialization, so both input paths converge before validation.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::interpreter::script::Script;

/// Role of the assistant; the only role allowed to carry a channel or a termination.
pub const ROLE_ASSISTANT: &str = "assistant";
pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_DEVELOPER: &str = "developer";
pub const ROLE_USER: &str = "user";

/// Content type marking JSON content.
pub const CONTENT_TYPE_JSON: &str = "json";
/// Content type marking an embedded HarmonyScript program.
pub const CONTENT_TYPE_HARMONY_SCRIPT: &str = "harmony-script";

/// Messages in wire order, as produced by [`crate::parser::parse`].
pub type Conversation = Vec<Message>;

/// Purpose of an assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Analysis,
    Commentary,
    Final,
}

impl Channel {
    /// Case-insensitive lookup used by the wire parser.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "analysis" => Some(Channel::Analysis),
            "commentary" => Some(Channel::Commentary),
            "final" => Some(Channel::Final),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Analysis => "analysis",
            Channel::Commentary => "commentary",
            Channel::Final => "final",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an assistant turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    End,
    Call,
    Return,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::End => "end",
            Termination::Call => "call",
            Termination::Return => "return",
        }
    }
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Free-form role: a fixed role or a tool name such as `functions.add`
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub channel: Option<Channel>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// String for plain text, object/array for structured content
    #[serde(default)]
    pub content: JsonValue,
    #[serde(default)]
    pub termination: Option<Termination>,
}

impl Message {
    /// Plain-text message with no channel, recipient, or termination.
    pub fn text(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            channel: None,
            recipient: None,
            content_type: None,
            content: JsonValue::String(content.into()),
            termination: None,
        }
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_content(mut self, content: JsonValue) -> Self {
        self.content = content;
        self
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = Some(termination);
        self
    }

    /// Role is exactly `assistant`. Roles are case-sensitive.
    pub fn is_assistant(&self) -> bool {
        self.role == ROLE_ASSISTANT
    }

    /// True when the content type names an embedded script.
    pub fn is_harmony_script(&self) -> bool {
        self.content_type.as_deref() == Some(CONTENT_TYPE_HARMONY_SCRIPT)
    }

    /// Text content, if this message carries plain text.
    pub fn text_content(&self) -> Option<&str> {
        self.content.as_str()
    }
}

/// Top-level HRF container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "HRFVersion", default)]
    pub version: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Envelope {
    pub fn new(version: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            version: version.into(),
            messages,
        }
    }

    /// Build an envelope from wire-parsed messages.
    ///
    /// On the wire every message needs a terminator, so the terminator of a
    /// non-assistant message is framing only and is not kept.
    pub fn from_conversation(version: impl Into<String>, conversation: Conversation) -> Self {
        let messages = conversation
            .into_iter()
            .map(|mut message| {
                if !message.is_assistant() {
                    message.termination = None;
                }
                message
            })
            .collect();
        Self::new(version, messages)
    }

    /// Index and message of the first system message carrying a HarmonyScript.
    pub fn script_message(&self) -> Option<(usize, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .find(|(_, m)| m.role.eq_ignore_ascii_case(ROLE_SYSTEM) && m.is_harmony_script())
    }

    /// Deserialize the embedded script, running per-step validation.
    ///
    /// Returns `Ok(None)` when the envelope carries no script.
    pub fn script(&self) -> Result<Option<Script>, serde_json::Error> {
        match self.script_message() {
            Some((_, message)) => serde_json::from_value(message.content.clone()).map(Some),
            None => Ok(None),
        }
    }
}
