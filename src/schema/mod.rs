//! JSON Schema boundary
//!
//! Structural checks for envelopes and embedded scripts are delegated to a
//! draft 2020-12 evaluator. The envelope schema document is loaded once and
//! compiled into an immutable [`JsonSchemaValidator`]; the script schema is
//! the `$defs/HarmonyScript` definition nested inside the same document.
//!
//! This module owns no business rules. The semantic validator depends on the
//! [`SchemaValidator`] trait only, so the evaluator can be swapped out.

use std::path::{Path, PathBuf};

use serde_json::{json, Value as JsonValue};
use thiserror::Error;

use crate::error::{ErrorCode, HrfError};

/// The bundled envelope schema document.
pub const BUNDLED_ENVELOPE_SCHEMA: &str = include_str!("hrf.schema.json");

/// Definition holding the script sub-schema inside the envelope document.
pub const SCRIPT_DEFINITION: &str = "HarmonyScript";

const DRAFT_2020_12: &str = "https://json-schema.org/draft/2020-12/schema";

#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("failed to read schema {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema document has no '$defs/{0}' definition")]
    MissingDefinition(String),

    #[error("failed to compile {which} schema: {message}")]
    Compile { which: &'static str, message: String },
}

impl From<SchemaLoadError> for HrfError {
    fn from(err: SchemaLoadError) -> Self {
        HrfError::new(ErrorCode::SchemaEnvelopeFailed, err.to_string())
    }
}

/// Structural validation of envelopes and scripts.
pub trait SchemaValidator: Send + Sync {
    /// `None` when the serialized envelope satisfies the envelope schema.
    fn validate_envelope(&self, envelope: &JsonValue) -> Option<HrfError>;

    /// `None` when the value satisfies the script sub-schema.
    fn validate_script(&self, script: &JsonValue) -> Option<HrfError>;
}

/// Draft 2020-12 evaluator backed by the `jsonschema` crate.
pub struct JsonSchemaValidator {
    envelope: jsonschema::Validator,
    script: jsonschema::Validator,
}

impl JsonSchemaValidator {
    /// Compile the bundled schema document.
    pub fn bundled() -> Result<Self, SchemaLoadError> {
        let document: JsonValue = serde_json::from_str(BUNDLED_ENVELOPE_SCHEMA)?;
        Self::from_document(&document)
    }

    /// Load and compile a schema document from disk.
    pub fn from_path(path: &Path) -> Result<Self, SchemaLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| SchemaLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: JsonValue = serde_json::from_str(&text)?;
        Self::from_document(&document)
    }

    /// Compile an envelope schema document and its nested script definition.
    pub fn from_document(document: &JsonValue) -> Result<Self, SchemaLoadError> {
        let defs = document
            .get("$defs")
            .filter(|defs| defs.get(SCRIPT_DEFINITION).is_some())
            .ok_or_else(|| SchemaLoadError::MissingDefinition(SCRIPT_DEFINITION.to_string()))?;

        let script_document = json!({
            "$schema": DRAFT_2020_12,
            "$defs": defs,
            "$ref": format!("#/$defs/{}", SCRIPT_DEFINITION),
        });

        let envelope = compile("envelope", document)?;
        let script = compile("script", &script_document)?;

        tracing::debug!("compiled envelope and script schemas");

        Ok(Self { envelope, script })
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate_envelope(&self, envelope: &JsonValue) -> Option<HrfError> {
        evaluate(
            &self.envelope,
            envelope,
            ErrorCode::SchemaEnvelopeFailed,
            "envelope failed schema validation",
        )
    }

    fn validate_script(&self, script: &JsonValue) -> Option<HrfError> {
        evaluate(
            &self.script,
            script,
            ErrorCode::SchemaScriptFailed,
            "script failed schema validation",
        )
    }
}

fn compile(which: &'static str, document: &JsonValue) -> Result<jsonschema::Validator, SchemaLoadError> {
    jsonschema::draft202012::new(document).map_err(|err| SchemaLoadError::Compile {
        which,
        message: err.to_string(),
    })
}

/// Run the evaluator and turn its diagnostics into a structured error.
fn evaluate(
    validator: &jsonschema::Validator,
    instance: &JsonValue,
    code: ErrorCode,
    message: &str,
) -> Option<HrfError> {
    let diagnostics: Vec<String> = validator
        .iter_errors(instance)
        .map(|err| {
            let path = err.instance_path.to_string();
            if path.is_empty() {
                err.to_string()
            } else {
                format!("{}: {}", path, err)
            }
        })
        .collect();

    if diagnostics.is_empty() {
        None
    } else {
        Some(HrfError::new(code, message).with_details(diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> JsonSchemaValidator {
        JsonSchemaValidator::bundled().expect("bundled schema compiles")
    }

    #[test]
    fn test_valid_envelope_passes() {
        let envelope = json!({
            "HRFVersion": "1.0",
            "messages": [{ "role": "user", "content": "hi" }]
        });
        assert!(validator().validate_envelope(&envelope).is_none());
    }

    #[test]
    fn test_envelope_schema_reports_diagnostics() {
        let envelope = json!({
            "HRFVersion": 3,
            "messages": [{ "role": "assistant", "content": "x", "channel": "loud" }]
        });

        let err = validator().validate_envelope(&envelope).expect("should fail");
        assert_eq!(err.code, ErrorCode::SchemaEnvelopeFailed);
        assert!(err.detail_lines().len() >= 2);
    }

    #[test]
    fn test_empty_version_and_messages_are_structurally_valid() {
        let envelope = json!({ "HRFVersion": "", "messages": [] });
        assert!(validator().validate_envelope(&envelope).is_none());
    }

    #[test]
    fn test_script_schema() {
        let v = validator();
        let good = json!({
            "steps": [
                { "type": "if", "condition": "$vars.x", "then": [{ "type": "halt" }] }
            ]
        });
        assert!(v.validate_script(&good).is_none());

        let bad = json!({ "steps": [{ "type": "teleport" }] });
        let err = v.validate_script(&bad).expect("should fail");
        assert_eq!(err.code, ErrorCode::SchemaScriptFailed);

        let missing_steps = json!({ "vars": {} });
        assert!(v.validate_script(&missing_steps).is_some());
    }

    #[test]
    fn test_document_without_script_definition_is_rejected() {
        let document = json!({ "type": "object", "$defs": {} });
        assert!(matches!(
            JsonSchemaValidator::from_document(&document),
            Err(SchemaLoadError::MissingDefinition(_))
        ));
    }
}
