//! Rule: Content Type
//!
//! - A declared content type must be exactly `json` or `harmony-script`.
//! - `harmony-script` content must be an object that satisfies the script
//!   schema and whose steps pass their structural checks.
//! - Messages without a content type carry string content.

use serde_json::Value as JsonValue;

use crate::interpreter::script::Script;
use crate::schema::SchemaValidator;
use crate::types::{Envelope, CONTENT_TYPE_HARMONY_SCRIPT, CONTENT_TYPE_JSON};

use super::super::{ValidationError, ValidationRule};

pub struct ContentTypeRule;

impl ValidationRule for ContentTypeRule {
    fn id(&self) -> &'static str {
        "content-type"
    }

    fn description(&self) -> &'static str {
        "Content must match its declared content type"
    }

    fn validate(&self, envelope: &Envelope, schema: &dyn SchemaValidator) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (i, message) in envelope.messages.iter().enumerate() {
            match message.content_type.as_deref() {
                None => {
                    if !message.content.is_string() {
                        errors.push(
                            ValidationError::error(
                                "content must be a string when no contentType is declared",
                                self.id(),
                            )
                            .at(i),
                        );
                    }
                }
                Some(CONTENT_TYPE_JSON) => {}
                Some(CONTENT_TYPE_HARMONY_SCRIPT) => {
                    if let Some(error) = self.check_script(&message.content, schema) {
                        errors.push(error.at(i));
                    }
                }
                Some(other) => {
                    errors.push(
                        ValidationError::error(
                            format!(
                                "contentType '{}' is not one of '{}', '{}'",
                                other, CONTENT_TYPE_JSON, CONTENT_TYPE_HARMONY_SCRIPT
                            ),
                            self.id(),
                        )
                        .at(i),
                    );
                }
            }
        }

        errors
    }
}

impl ContentTypeRule {
    fn check_script(&self, content: &JsonValue, schema: &dyn SchemaValidator) -> Option<ValidationError> {
        if !content.is_object() {
            return Some(ValidationError::error(
                "harmony-script content must be a JSON object",
                self.id(),
            ));
        }

        if let Some(err) = schema.validate_script(content) {
            let diagnostics = err.detail_lines().join("; ");
            return Some(ValidationError::error(
                format!("{}: {}", err.message, diagnostics),
                self.id(),
            ));
        }

        // Step-level rules run during deserialization
        match serde_json::from_value::<Script>(content.clone()) {
            Ok(_) => None,
            Err(err) => Some(ValidationError::error(
                format!("invalid script step: {}", err),
                self.id(),
            )),
        }
    }
}
