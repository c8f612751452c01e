//! Validation errors for context items

use thiserror::Error;

/// Reasons a context item is malformed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ItemError {
    /// Key is empty after formatting
    #[error("Context key must not be empty")]
    EmptyKey,

    /// Source identifier is empty
    #[error("Context item '{0}' has no source")]
    EmptySource(String),

    /// Confidence is NaN, infinite, or outside [0, 1]
    #[error("Confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}
