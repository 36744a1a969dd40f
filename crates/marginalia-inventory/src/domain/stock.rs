//! Stock adjustment rules.

use marginalia_core::error::DomainError;
use serde::Serialize;

/// Why an adjustment was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AdjustRejection {
    /// Applying the delta would take the balance below zero.
    WouldGoNegative {
        /// The balance, unchanged.
        balance: i64,
    },
}

/// Result of an adjustment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustOutcome {
    /// The movement was appended.
    Applied {
        /// Balance afterwards.
        balance: i64,
        /// `true` when this movement id had already been applied.
        replayed: bool,
    },
    /// Neither the counter nor the log changed.
    Rejected(AdjustRejection),
}

/// Validates the shape of an adjustment request.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a zero delta or a blank reason.
pub fn validate_adjustment(delta: i64, reason: &str) -> Result<(), DomainError> {
    if delta == 0 {
        return Err(DomainError::Validation(
            "stock delta must not be zero".into(),
        ));
    }
    if reason.trim().is_empty() {
        return Err(DomainError::Validation(
            "stock movement needs a reason".into(),
        ));
    }
    Ok(())
}

/// Computes the balance after applying `delta`.
///
/// # Errors
///
/// Returns `AdjustRejection::WouldGoNegative` if the result is below zero
/// or does not fit.
pub fn next_balance(balance: i64, delta: i64) -> Result<i64, AdjustRejection> {
    match balance.checked_add(delta) {
        Some(next) if next >= 0 => Ok(next),
        _ => Err(AdjustRejection::WouldGoNegative { balance }),
    }
}
