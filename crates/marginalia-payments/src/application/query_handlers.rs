//! Query handlers for the Payments context.

use marginalia_core::actor::{Actor, StaffRole};
use marginalia_core::error::DomainError;
use marginalia_core::model::FlaggedPaymentEvent;
use marginalia_core::store::CommerceStore;

/// Lists notifications parked for operator review, oldest first.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` unless the actor is an admin.
pub async fn flagged_events(
    actor: &Actor,
    store: &dyn CommerceStore,
) -> Result<Vec<FlaggedPaymentEvent>, DomainError> {
    actor.require("review flagged payments", &[StaffRole::Admin])?;
    let mut uow = store.begin().await?;
    uow.flagged_payment_events().await
}
