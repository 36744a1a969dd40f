//! Domain error types.
//!
//! Business rejections (sold out, insufficient balance, …) are not errors:
//! every operation returns a typed outcome for those. `DomainError` covers
//! invalid input, authorization failures and infrastructure faults.

use thiserror::Error;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record looked up.
        entity: &'static str,
        /// The identifier that did not resolve.
        id: String,
    },

    /// A write conflicted with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record is already in a terminal status.
    #[error("{entity} {id} is already {status}")]
    AlreadyTerminal {
        /// The kind of record.
        entity: &'static str,
        /// The record identifier.
        id: String,
        /// The terminal status it is in.
        status: &'static str,
    },

    /// Payment metadata did not resolve to a domain record.
    #[error("unroutable payment notification: {0}")]
    Unroutable(String),

    /// An inbound payload failed authenticity verification.
    #[error("bad signature: {0}")]
    BadSignature(String),

    /// The caller lacks the role required for the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Shorthand for [`DomainError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
