//! Engine error taxonomy.
//!
//! Validation failure is an expected, user-facing outcome: it travels as an
//! `Err` value the caller branches on, never as a panic. Dictionary failures
//! are infrastructure errors surfaced to whoever drove the schema refresh.

use thiserror::Error;

/// One failed field with its displayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Failure sentinel returned by `validate()`.
#[derive(Debug, Clone, Error)]
pub enum ValidationFailure {
    /// A mounted widget's own validate capability returned `false`.
    #[error("widget validation failed for field `{field}`")]
    Widget { field: String },
    /// One or more rule checks failed.
    #[error("{} field(s) failed validation", .0.len())]
    Rules(Vec<FieldError>),
}

impl ValidationFailure {
    /// Field errors carried by this failure, empty for widget failures.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ValidationFailure::Widget { .. } => &[],
            ValidationFailure::Rules(errors) => errors,
        }
    }
}

/// Non-validation engine failures.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("dictionary `{name}` resolution failed")]
    Dictionary {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
