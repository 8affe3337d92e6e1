//! Rule: Envelope Shape
//!
//! The version tag must be non-empty and the envelope must carry at least
//! one message. Both are semantic rules; the schema accepts either being empty.

use crate::schema::SchemaValidator;
use crate::types::Envelope;

use super::super::{ValidationError, ValidationRule};

pub struct EnvelopeShapeRule;

impl ValidationRule for EnvelopeShapeRule {
    fn id(&self) -> &'static str {
        "envelope-shape"
    }

    fn description(&self) -> &'static str {
        "HRFVersion must be set and messages must not be empty"
    }

    fn validate(&self, envelope: &Envelope, _schema: &dyn SchemaValidator) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if envelope.version.trim().is_empty() {
            errors.push(ValidationError::error("HRFVersion is required", self.id()));
        }
        if envelope.messages.is_empty() {
            errors.push(ValidationError::error(
                "envelope must contain at least one message",
                self.id(),
            ));
        }

        errors
    }
}
