//! Rules: Termination
//!
//! - `termination-role`: only assistant messages may carry a termination.
//! - `single-termination`: more than one terminated message across the
//!   envelope is reported once, as a warning.

use crate::schema::SchemaValidator;
use crate::types::Envelope;

use super::super::{ValidationError, ValidationRule};

pub struct TerminationRoleRule;

impl ValidationRule for TerminationRoleRule {
    fn id(&self) -> &'static str {
        "termination-role"
    }

    fn description(&self) -> &'static str {
        "Only assistant messages may carry a termination"
    }

    fn validate(&self, envelope: &Envelope, _schema: &dyn SchemaValidator) -> Vec<ValidationError> {
        envelope
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.termination.is_some() && !m.is_assistant())
            .map(|(i, m)| {
                ValidationError::error(
                    format!(
                        "termination is only allowed on assistant messages (role '{}')",
                        m.role
                    ),
                    self.id(),
                )
                .at(i)
            })
            .collect()
    }
}

pub struct SingleTerminationRule;

impl ValidationRule for SingleTerminationRule {
    fn id(&self) -> &'static str {
        "single-termination"
    }

    fn description(&self) -> &'static str {
        "At most one message should carry a termination"
    }

    fn validate(&self, envelope: &Envelope, _schema: &dyn SchemaValidator) -> Vec<ValidationError> {
        let terminated = envelope
            .messages
            .iter()
            .filter(|m| m.termination.is_some())
            .count();

        if terminated > 1 {
            vec![ValidationError::warning(
                format!("{} messages carry a termination marker; expected at most one", terminated),
                self.id(),
            )]
        } else {
            Vec::new()
        }
    }
}
