//! Error taxonomy of the grading engine
//!
//! Every rule violation carries an English and a Spanish message so the
//! console can render it in the user's language without a second lookup.

use serde::Serialize;
use thiserror::Error;

/// A single rule violated by one input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
    pub message_es: String,
}

impl FieldViolation {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        message_es: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            message_es: message_es.into(),
        }
    }
}

/// Errors produced by the grading engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradingError {
    /// Bad input shape or range
    #[error("Validation error: {}", .0.message)]
    Validation(FieldViolation),

    /// Several fields of one input violate their rules
    #[error("Validation failed for {} field(s)", .0.len())]
    InvalidFields(Vec<FieldViolation>),

    #[error("{0} not found")]
    NotFound(String),

    /// Scope ids that do not agree with each other
    #[error("Referential error: {}", .0.message)]
    Referential(FieldViolation),

    /// Stale optimistic-concurrency token
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A collaborator handed the engine data that breaks its contract
    #[error("Precondition failed: {0}")]
    Precondition(String),
}

impl GradingError {
    pub fn validation(
        field: impl Into<String>,
        message: impl Into<String>,
        message_es: impl Into<String>,
    ) -> Self {
        GradingError::Validation(FieldViolation::new(field, message, message_es))
    }

    pub fn referential(
        field: impl Into<String>,
        message: impl Into<String>,
        message_es: impl Into<String>,
    ) -> Self {
        GradingError::Referential(FieldViolation::new(field, message, message_es))
    }

    /// Collapse a list of violations into the narrowest error variant
    pub fn from_violations(mut violations: Vec<FieldViolation>) -> Option<Self> {
        match violations.len() {
            0 => None,
            1 => violations.pop().map(GradingError::Validation),
            _ => Some(GradingError::InvalidFields(violations)),
        }
    }

    /// Field-level detail of this error, empty for errors without fields
    pub fn violations(&self) -> Vec<FieldViolation> {
        match self {
            GradingError::Validation(v) | GradingError::Referential(v) => vec![v.clone()],
            GradingError::InvalidFields(vs) => vs.clone(),
            _ => Vec::new(),
        }
    }

    /// True for errors caused by user input rather than by a collaborator
    pub fn is_user_error(&self) -> bool {
        !matches!(self, GradingError::Precondition(_))
    }
}

/// Result type alias for engine operations
pub type GradingResult<T> = Result<T, GradingError>;
