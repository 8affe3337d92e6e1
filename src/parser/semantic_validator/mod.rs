//! Semantic Validation for HRF envelopes
//!
//! Layered on top of schema validation: the envelope is first checked
//! against the envelope schema (failing fast), then every rule runs and all
//! violations are collected so the caller sees every problem at once.
//!
//! # Usage
//!
//! ```ignore
//! use harmony_core::parser::semantic_validator::validate_for_hrf;
//! use harmony_core::schema::JsonSchemaValidator;
//!
//! let schema = JsonSchemaValidator::bundled()?;
//! if let Some(error) = validate_for_hrf(&envelope, &schema) {
//!     // error.code is HRF_SCHEMA_ENVELOPE_FAILED or HRF_SEMANTIC_VALIDATION_FAILED
//! }
//! ```
//!
//! # Adding a New Rule
//!
//! 1. Create a new file in `semantic_validator/rules/`
//! 2. Implement `ValidationRule` for your struct
//! 3. Add it to the `Validator::new()` constructor

pub mod rules;

use crate::error::{ErrorCode, HrfError};
use crate::schema::SchemaValidator;
use crate::types::Envelope;

// ============================================================================
// Validation Error Types
// ============================================================================

/// A single violation found by a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Index of the offending message, if the violation is message-specific
    pub message_index: Option<usize>,
    /// Human-readable message
    pub message: String,
    pub severity: Severity,
    /// Which rule produced this error
    pub rule_id: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Always fails validation
    Error,
    /// Fails validation only when `ValidatorOptions::warnings_fail` is set
    Warning,
}

impl ValidationError {
    pub fn error(message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            message_index: None,
            message: message.into(),
            severity: Severity::Error,
            rule_id,
        }
    }

    pub fn warning(message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            message_index: None,
            message: message.into(),
            severity: Severity::Warning,
            rule_id,
        }
    }

    /// Attach the index of the offending message.
    pub fn at(mut self, index: usize) -> Self {
        self.message_index = Some(index);
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(index) = self.message_index {
            write!(f, "messages[{}]: ", index)?;
        }
        if !self.is_error() {
            write!(f, "warning: ")?;
        }
        write!(f, "{} [{}]", self.message, self.rule_id)
    }
}

impl std::error::Error for ValidationError {}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait that all validation rules must implement.
///
/// Rules are independent of each other and report every violation they find.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier for this rule (e.g., "termination-role")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    /// Run the rule. An empty vector means no issues found.
    ///
    /// `schema` is available for rules that delegate nested checks.
    fn validate(&self, envelope: &Envelope, schema: &dyn SchemaValidator) -> Vec<ValidationError>;
}

// ============================================================================
// Validator - Runs All Rules
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Count warning-severity violations as failures
    pub warnings_fail: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            warnings_fail: true,
        }
    }
}

/// The main validator that orchestrates all validation rules.
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
    options: ValidatorOptions,
}

impl Validator {
    /// Create a new validator with all built-in rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(rules::EnvelopeShapeRule),
                Box::new(rules::MessageRoleRule),
                Box::new(rules::TerminationRoleRule),
                Box::new(rules::ContentTypeRule),
                Box::new(rules::AssistantChannelRule),
                // Warning rules
                Box::new(rules::SingleTerminationRule),
            ],
            options: ValidatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ValidatorOptions {
        self.options
    }

    /// Run all rules and collect every violation.
    pub fn validate(&self, envelope: &Envelope, schema: &dyn SchemaValidator) -> Vec<ValidationError> {
        self.rules
            .iter()
            .flat_map(|rule| {
                let found = rule.validate(envelope, schema);
                tracing::debug!(rule = rule.id(), violations = found.len(), "ran validation rule");
                found
            })
            .collect()
    }

    /// Schema check, then the semantic rules.
    ///
    /// Returns `None` when the envelope is valid.
    pub fn validate_for_hrf(&self, envelope: &Envelope, schema: &dyn SchemaValidator) -> Option<HrfError> {
        let serialized = match serde_json::to_value(envelope) {
            Ok(value) => value,
            Err(err) => {
                return Some(HrfError::new(
                    ErrorCode::SchemaEnvelopeFailed,
                    format!("envelope could not be serialized: {}", err),
                ))
            }
        };

        if let Some(mut err) = schema.validate_envelope(&serialized) {
            err.code = ErrorCode::SchemaEnvelopeFailed;
            return Some(err);
        }

        let violations = self.validate(envelope, schema);
        let fails = violations
            .iter()
            .any(|v| v.is_error() || self.options.warnings_fail);

        if !fails {
            for warning in &violations {
                tracing::warn!(%warning, "validation warning");
            }
            return None;
        }

        let details: Vec<String> = violations.iter().map(ToString::to_string).collect();
        Some(
            HrfError::new(
                ErrorCode::SemanticValidationFailed,
                format!("envelope failed semantic validation with {} violation(s)", details.len()),
            )
            .with_details(details),
        )
    }

    /// Get a list of all registered rules (useful for documentation)
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Validate an envelope with the built-in rules and default options.
pub fn validate_for_hrf(envelope: &Envelope, schema: &dyn SchemaValidator) -> Option<HrfError> {
    Validator::new().validate_for_hrf(envelope, schema)
}
