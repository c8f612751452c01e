//! Confidence scores
//!
//! A confidence is a reliability estimate in [0.0, 1.0]. Scores of different
//! items are independent and never required to sum to 1.

use crate::ItemError;

/// Lowest accepted confidence
pub const MIN: f64 = 0.0;

/// Highest accepted confidence
pub const MAX: f64 = 1.0;

/// Check that a confidence lies in [0, 1]
///
/// Out-of-range values are rejected rather than clamped.
///
/// # Examples
///
/// ```
/// use conclave_domain::confidence;
///
/// assert_eq!(confidence::validate(0.85), Ok(0.85));
/// assert!(confidence::validate(1.2).is_err());
/// ```
pub fn validate(value: f64) -> Result<f64, ItemError> {
    if value.is_finite() && (MIN..=MAX).contains(&value) {
        Ok(value)
    } else {
        Err(ItemError::ConfidenceOutOfRange(value))
    }
}

/// Combine several confidences into one score (arithmetic mean)
///
/// Returns 0.0 for an empty slice.
pub fn combined(confidences: &[f64]) -> f64 {
    if confidences.is_empty() {
        return 0.0;
    }

    confidences.iter().sum::<f64>() / confidences.len() as f64
}
