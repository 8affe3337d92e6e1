//! Structured error shape shared by validation and execution
//!
//! Every failure that crosses the library boundary is reported as an
//! [`HrfError`]: a stable machine-readable code, a human message, and free-form
//! details (usually a list of diagnostics).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "HRF_FORMAT_ERROR")]
    FormatError,
    #[serde(rename = "HRF_SCHEMA_ENVELOPE_FAILED")]
    SchemaEnvelopeFailed,
    #[serde(rename = "HRF_SCHEMA_SCRIPT_FAILED")]
    SchemaScriptFailed,
    #[serde(rename = "HRF_SEMANTIC_VALIDATION_FAILED")]
    SemanticValidationFailed,
    #[serde(rename = "HRF_EXECUTION_ERROR")]
    ExecutionError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FormatError => "HRF_FORMAT_ERROR",
            ErrorCode::SchemaEnvelopeFailed => "HRF_SCHEMA_ENVELOPE_FAILED",
            ErrorCode::SchemaScriptFailed => "HRF_SCHEMA_SCRIPT_FAILED",
            ErrorCode::SemanticValidationFailed => "HRF_SEMANTIC_VALIDATION_FAILED",
            ErrorCode::ExecutionError => "HRF_EXECUTION_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{ code, message, details }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrfError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub details: JsonValue,
}

impl HrfError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: JsonValue::Null,
        }
    }

    pub fn with_details(mut self, details: impl Into<JsonValue>) -> Self {
        self.details = details.into();
        self
    }

    /// Details as a list of strings, when they were recorded that way.
    pub fn detail_lines(&self) -> Vec<&str> {
        match &self.details {
            JsonValue::Array(items) => items.iter().filter_map(|v| v.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for HrfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for HrfError {}

impl From<crate::parser::FormatError> for HrfError {
    fn from(err: crate::parser::FormatError) -> Self {
        HrfError::new(ErrorCode::FormatError, err.to_string())
    }
}
