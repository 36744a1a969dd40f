//! Admission rules for event bookings.

use marginalia_core::error::DomainError;
use marginalia_core::model::{BookingRecord, EventRecord, MinorUnits, RecordStatus};
use serde::Serialize;
use uuid::Uuid;

/// Why an admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionRejection {
    /// Every place is taken by a pending or paid booking.
    SoldOut,
    /// No event with that id.
    EventNotFound,
}

/// Result of an admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// A pending booking now holds a place.
    Admitted {
        /// The booking created (or found, on replay).
        booking_id: Uuid,
        /// `true` when the request id had already been admitted.
        replayed: bool,
    },
    /// No booking was created.
    Rejected(AdmissionRejection),
}

/// Checks whether one more booking fits. `active` is the number of
/// non-cancelled bookings counted under the event's lock.
///
/// # Errors
///
/// Returns `AdmissionRejection::SoldOut` when `active` has reached capacity.
/// A capacity lowered below `active` also counts as sold out.
pub fn check_capacity(event: &EventRecord, active: i64) -> Result<(), AdmissionRejection> {
    if active >= i64::from(event.capacity) {
        Err(AdmissionRejection::SoldOut)
    } else {
        Ok(())
    }
}

/// Validates an event definition.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a non-positive capacity or price,
/// or an empty title. Every booking is settled through a payment session,
/// which cannot charge nothing.
pub fn validate_event(title: &str, capacity: i32, unit_price: MinorUnits) -> Result<(), DomainError> {
    if title.trim().is_empty() {
        return Err(DomainError::Validation("event title must not be empty".into()));
    }
    validate_capacity(capacity)?;
    if unit_price <= 0 {
        return Err(DomainError::Validation(format!(
            "unit price must be positive, got {unit_price}"
        )));
    }
    Ok(())
}

/// Validates a capacity value.
///
/// # Errors
///
/// Returns `DomainError::Validation` unless `capacity` is positive.
pub fn validate_capacity(capacity: i32) -> Result<(), DomainError> {
    if capacity <= 0 {
        return Err(DomainError::Validation(format!(
            "capacity must be positive, got {capacity}"
        )));
    }
    Ok(())
}

/// Checks that a booking may be cancelled.
///
/// # Errors
///
/// Returns `DomainError::AlreadyTerminal` if the booking is paid or
/// cancelled.
pub fn ensure_cancellable(booking: &BookingRecord) -> Result<(), DomainError> {
    match booking.status {
        RecordStatus::Pending => Ok(()),
        status @ (RecordStatus::Paid | RecordStatus::Cancelled) => {
            Err(DomainError::AlreadyTerminal {
                entity: "booking",
                id: booking.id.to_string(),
                status: status.as_str(),
            })
        }
    }
}
