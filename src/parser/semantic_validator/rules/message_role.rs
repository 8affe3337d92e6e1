//! Rule: Message Role
//!
//! Every message needs a non-blank role.

use crate::schema::SchemaValidator;
use crate::types::Envelope;

use super::super::{ValidationError, ValidationRule};

pub struct MessageRoleRule;

impl ValidationRule for MessageRoleRule {
    fn id(&self) -> &'static str {
        "message-role"
    }

    fn description(&self) -> &'static str {
        "Messages must have a non-blank role"
    }

    fn validate(&self, envelope: &Envelope, _schema: &dyn SchemaValidator) -> Vec<ValidationError> {
        envelope
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role.trim().is_empty())
            .map(|(i, _)| ValidationError::error("role is required", self.id()).at(i))
            .collect()
    }
}
