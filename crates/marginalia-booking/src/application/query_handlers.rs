//! Query handlers for the Event Booking context.

use chrono::{DateTime, Utc};
use marginalia_core::error::DomainError;
use marginalia_core::model::{MinorUnits, RecordStatus};
use marginalia_core::store::CommerceStore;
use serde::Serialize;
use uuid::Uuid;

/// Read-only view of a booking.
#[derive(Debug, Serialize)]
pub struct BookingView {
    /// The booking identifier.
    pub booking_id: Uuid,
    /// The event booked.
    pub event_id: Uuid,
    /// The customer.
    pub requester_id: Uuid,
    /// Current status.
    pub status: RecordStatus,
    /// When the booking was admitted.
    pub created_at: DateTime<Utc>,
}

/// Read-only view of an event and its remaining places.
#[derive(Debug, Serialize)]
pub struct EventView {
    /// The event identifier.
    pub event_id: Uuid,
    /// Display title.
    pub title: String,
    /// Number of places.
    pub capacity: i32,
    /// Price of one place.
    pub unit_price: MinorUnits,
    /// Pending and paid bookings.
    pub active_bookings: i64,
    /// Places still available (never negative).
    pub places_left: i64,
}

/// Retrieves a booking by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no such booking exists.
pub async fn get_booking(
    booking_id: Uuid,
    store: &dyn CommerceStore,
) -> Result<BookingView, DomainError> {
    let mut uow = store.begin().await?;
    let booking = uow
        .find_booking(booking_id)
        .await?
        .ok_or_else(|| DomainError::not_found("booking", booking_id))?;
    Ok(BookingView {
        booking_id: booking.id,
        event_id: booking.event_id,
        requester_id: booking.requester_id,
        status: booking.status,
        created_at: booking.created_at,
    })
}

/// Retrieves an event with its current availability.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no such event exists.
pub async fn get_event(event_id: Uuid, store: &dyn CommerceStore) -> Result<EventView, DomainError> {
    let mut uow = store.begin().await?;
    let event = uow
        .find_event(event_id)
        .await?
        .ok_or_else(|| DomainError::not_found("event", event_id))?;
    let active_bookings = uow.count_active_bookings(event_id).await?;
    Ok(EventView {
        event_id: event.id,
        title: event.title,
        capacity: event.capacity,
        unit_price: event.unit_price,
        active_bookings,
        places_left: (i64::from(event.capacity) - active_bookings).max(0),
    })
}
