//! Resolves a `{kind, domain_id}` pair to what it costs.

use marginalia_core::error::DomainError;
use marginalia_core::model::{DomainKind, MinorUnits, RecordStatus};
use marginalia_core::store::UnitOfWork;
use uuid::Uuid;

/// The parts of a booking or order the issuer needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Payable {
    pub requester_id: Uuid,
    pub status: RecordStatus,
    pub amount_due: MinorUnits,
}

/// Loads a record, locking it when `lock` is set. A booking costs its
/// event's unit price.
pub(crate) async fn load(
    uow: &mut dyn UnitOfWork,
    kind: DomainKind,
    domain_id: Uuid,
    lock: bool,
) -> Result<Option<Payable>, DomainError> {
    match kind {
        DomainKind::Booking => {
            let booking = if lock {
                uow.lock_booking(domain_id).await?
            } else {
                uow.find_booking(domain_id).await?
            };
            let Some(booking) = booking else {
                return Ok(None);
            };
            let event = uow.find_event(booking.event_id).await?.ok_or_else(|| {
                DomainError::Infrastructure(format!(
                    "booking {domain_id} references missing event {}",
                    booking.event_id
                ))
            })?;
            Ok(Some(Payable {
                requester_id: booking.requester_id,
                status: booking.status,
                amount_due: event.unit_price,
            }))
        }
        DomainKind::Order => {
            let order = if lock {
                uow.lock_order(domain_id).await?
            } else {
                uow.find_order(domain_id).await?
            };
            Ok(order.map(|order| Payable {
                requester_id: order.requester_id,
                status: order.status,
                amount_due: order.amount_due(),
            }))
        }
    }
}
