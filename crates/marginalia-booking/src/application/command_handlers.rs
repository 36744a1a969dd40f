//! Command handlers for the Event Booking context.
//!
//! Each handler runs in exactly one unit of work: lock the records it
//! touches, decide, write, commit. Returning before `commit` rolls back.

use marginalia_core::actor::{Actor, StaffRole};
use marginalia_core::clock::Clock;
use marginalia_core::command::Command;
use marginalia_core::error::DomainError;
use marginalia_core::model::{BookingRecord, EventRecord, RecordStatus};
use marginalia_core::store::CommerceStore;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::admission::{self, AdmissionOutcome, AdmissionRejection};
use crate::domain::commands::{AdmitBooking, CancelBooking, CreateEvent, SetCapacity};

/// Handles the `CreateEvent` command. Replaying the same event id returns the
/// stored event unchanged.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` unless the actor is an admin,
/// `DomainError::Validation` for an invalid definition, or an
/// infrastructure error from the store.
#[instrument(skip_all, fields(event_id = %command.event_id))]
pub async fn handle_create_event(
    command: &CreateEvent,
    actor: &Actor,
    clock: &dyn Clock,
    store: &dyn CommerceStore,
) -> Result<EventRecord, DomainError> {
    actor.require("create events", &[StaffRole::Admin])?;
    admission::validate_event(&command.title, command.capacity, command.unit_price)?;

    let mut uow = store.begin().await?;
    if let Some(existing) = uow.lock_event(command.event_id).await? {
        return Ok(existing);
    }

    let event = EventRecord {
        id: command.event_id,
        title: command.title.trim().to_owned(),
        capacity: command.capacity,
        unit_price: command.unit_price,
        created_at: clock.now(),
    };
    uow.insert_event(&event).await?;
    uow.commit().await?;

    info!(command = command.command_type(), actor = %actor, "event created");
    Ok(event)
}

/// Handles the `SetCapacity` command. Existing bookings are never cancelled;
/// a capacity below the active count only blocks further admissions.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` unless the actor is an admin,
/// `DomainError::Validation` for a non-positive capacity, or
/// `DomainError::NotFound` if the event does not exist.
#[instrument(skip_all, fields(event_id = %command.event_id))]
pub async fn handle_set_capacity(
    command: &SetCapacity,
    actor: &Actor,
    store: &dyn CommerceStore,
) -> Result<EventRecord, DomainError> {
    actor.require("edit event capacity", &[StaffRole::Admin])?;
    admission::validate_capacity(command.capacity)?;

    let mut uow = store.begin().await?;
    let mut event = uow
        .lock_event(command.event_id)
        .await?
        .ok_or_else(|| DomainError::not_found("event", command.event_id))?;

    uow.update_event_capacity(event.id, command.capacity).await?;
    uow.commit().await?;

    info!(
        command = command.command_type(),
        actor = %actor,
        from = event.capacity,
        to = command.capacity,
        "event capacity changed"
    );
    event.capacity = command.capacity;
    Ok(event)
}

/// Handles the `AdmitBooking` command.
///
/// The event row is locked before the active bookings are counted, and the
/// booking is inserted under the same lock. Two concurrent admissions for
/// the same event are therefore serialized, and the second one sees the
/// first one's booking in its count.
///
/// # Errors
///
/// Sold-out and unknown events are reported through
/// [`AdmissionOutcome::Rejected`]. Returns `DomainError::Validation` when the
/// request id already admitted a booking for another event or customer, and
/// an infrastructure error if the store fails.
#[instrument(skip_all, fields(event_id = %command.event_id, request_id = %command.request_id))]
pub async fn handle_admit(
    command: &AdmitBooking,
    clock: &dyn Clock,
    store: &dyn CommerceStore,
) -> Result<AdmissionOutcome, DomainError> {
    let mut uow = store.begin().await?;

    let Some(event) = uow.lock_event(command.event_id).await? else {
        info!("admission rejected: event not found");
        return Ok(AdmissionOutcome::Rejected(AdmissionRejection::EventNotFound));
    };

    if let Some(existing) = uow.find_booking_by_request(command.request_id).await? {
        if existing.event_id != command.event_id || existing.requester_id != command.requester_id
        {
            return Err(DomainError::Validation(format!(
                "request id {} was already used for a different booking",
                command.request_id
            )));
        }
        return Ok(AdmissionOutcome::Admitted {
            booking_id: existing.id,
            replayed: true,
        });
    }

    let active = uow.count_active_bookings(event.id).await?;
    if let Err(rejection) = admission::check_capacity(&event, active) {
        info!(capacity = event.capacity, active, "admission rejected: sold out");
        return Ok(AdmissionOutcome::Rejected(rejection));
    }

    let now = clock.now();
    let booking = BookingRecord {
        id: Uuid::now_v7(),
        event_id: event.id,
        requester_id: command.requester_id,
        status: RecordStatus::Pending,
        request_id: command.request_id,
        created_at: now,
        updated_at: now,
    };
    uow.insert_booking(&booking).await?;
    uow.commit().await?;

    info!(
        command = command.command_type(),
        booking_id = %booking.id,
        places_left = i64::from(event.capacity) - active - 1,
        "booking admitted"
    );
    Ok(AdmissionOutcome::Admitted {
        booking_id: booking.id,
        replayed: false,
    })
}

/// Handles the `CancelBooking` command: pending → cancelled, releasing the
/// place.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown booking and
/// `DomainError::AlreadyTerminal` for a paid or cancelled one.
#[instrument(skip_all, fields(booking_id = %command.booking_id))]
pub async fn handle_cancel_booking(
    command: &CancelBooking,
    clock: &dyn Clock,
    store: &dyn CommerceStore,
) -> Result<BookingRecord, DomainError> {
    let mut uow = store.begin().await?;
    let mut booking = uow
        .lock_booking(command.booking_id)
        .await?
        .ok_or_else(|| DomainError::not_found("booking", command.booking_id))?;

    admission::ensure_cancellable(&booking)?;

    let now = clock.now();
    uow.set_booking_status(booking.id, RecordStatus::Cancelled, now)
        .await?;
    uow.commit().await?;

    info!(command = command.command_type(), "booking cancelled");
    booking.status = RecordStatus::Cancelled;
    booking.updated_at = now;
    Ok(booking)
}
