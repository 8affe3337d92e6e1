//! Rule: Assistant Channel
//!
//! Assistant messages must say which channel they belong to.

use crate::schema::SchemaValidator;
use crate::types::Envelope;

use super::super::{ValidationError, ValidationRule};

pub struct AssistantChannelRule;

impl ValidationRule for AssistantChannelRule {
    fn id(&self) -> &'static str {
        "assistant-channel"
    }

    fn description(&self) -> &'static str {
        "Assistant messages must carry analysis, commentary or final channel"
    }

    fn validate(&self, envelope: &Envelope, _schema: &dyn SchemaValidator) -> Vec<ValidationError> {
        envelope
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_assistant() && m.channel.is_none())
            .map(|(i, _)| {
                ValidationError::error(
                    "assistant message must have channel analysis, commentary or final",
                    self.id(),
                )
                .at(i)
            })
            .collect()
    }
}
