//! Staff identity for privileged ledger operations.
//!
//! Credential issuance lives outside the commerce core; callers hand in an
//! already-authenticated [`Actor`] and each operation checks the role.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Role carried by an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    /// Back-office administrator.
    Admin,
    /// Till / point-of-sale terminal.
    PointOfSale,
    /// The service itself, acting during payment reconciliation.
    System,
}

impl StaffRole {
    /// Returns the wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::PointOfSale => "point_of_sale",
            Self::System => "system",
        }
    }
}

/// An authenticated caller of a privileged operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Stable identifier recorded in audit trails.
    pub id: String,
    /// The caller's role.
    pub role: StaffRole,
}

impl Actor {
    /// Creates a new actor.
    pub fn new(id: impl Into<String>, role: StaffRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// The actor the reconciler uses for ledger effects of a paid order.
    #[must_use]
    pub fn system(component: &str) -> Self {
        Self::new(format!("system:{component}"), StaffRole::System)
    }

    /// Ensures the actor holds one of `allowed`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Unauthorized` when the role is not permitted.
    pub fn require(&self, operation: &str, allowed: &[StaffRole]) -> Result<(), DomainError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(DomainError::Unauthorized(format!(
                "{} ({}) may not {operation}",
                self.id,
                self.role.as_str()
            )))
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
