//! Payment session issuance rules.

use marginalia_core::error::DomainError;
use marginalia_core::gateway::SessionHandle;
use marginalia_core::model::{MinorUnits, RecordStatus};
use serde::Serialize;

/// Why no session was issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IssueRefusal {
    /// The record does not exist.
    NotFound,
    /// The record is already paid or cancelled.
    NotPending {
        /// Its current status.
        status: RecordStatus,
    },
    /// The amount asked for is not what the record costs.
    AmountMismatch {
        /// The record's amount due.
        expected: MinorUnits,
        /// The amount in the request.
        actual: MinorUnits,
    },
}

/// Result of an issue attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    /// A session was created and recorded.
    Issued(SessionHandle),
    /// Nothing was created, or the created session was not recorded.
    Refused(IssueRefusal),
}

/// Checks that a record may be paid for `amount`.
///
/// # Errors
///
/// Returns the refusal that applies.
pub fn check_issuable(
    status: RecordStatus,
    amount_due: MinorUnits,
    amount: MinorUnits,
) -> Result<(), IssueRefusal> {
    if status != RecordStatus::Pending {
        return Err(IssueRefusal::NotPending { status });
    }
    if amount != amount_due {
        return Err(IssueRefusal::AmountMismatch {
            expected: amount_due,
            actual: amount,
        });
    }
    Ok(())
}

/// Validates the parts of an issue request that do not depend on state.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a non-positive amount or a blank
/// contact email or currency.
pub fn validate_request(
    amount: MinorUnits,
    currency: &str,
    contact_email: &str,
) -> Result<(), DomainError> {
    if amount <= 0 {
        return Err(DomainError::Validation(format!(
            "checkout amount must be positive, got {amount}"
        )));
    }
    if currency.trim().is_empty() {
        return Err(DomainError::Validation("currency is blank".into()));
    }
    if !contact_email.contains('@') {
        return Err(DomainError::Validation(
            "contact email is not an address".into(),
        ));
    }
    Ok(())
}
