//! Commands for the Event Booking context.

use marginalia_core::command::Command;
use marginalia_core::model::MinorUnits;
use uuid::Uuid;

/// Command to create a bookable event.
#[derive(Debug, Clone)]
pub struct CreateEvent {
    /// The new event's id; doubles as the idempotency key.
    pub event_id: Uuid,
    /// Display title.
    pub title: String,
    /// Number of places.
    pub capacity: i32,
    /// Price of one place.
    pub unit_price: MinorUnits,
}

impl Command for CreateEvent {
    fn command_type(&self) -> &'static str {
        "booking.create_event"
    }

    fn request_id(&self) -> Uuid {
        self.event_id
    }
}

/// Command to change an event's capacity.
#[derive(Debug, Clone)]
pub struct SetCapacity {
    /// Idempotency key.
    pub request_id: Uuid,
    /// The event to edit.
    pub event_id: Uuid,
    /// The new number of places.
    pub capacity: i32,
}

impl Command for SetCapacity {
    fn command_type(&self) -> &'static str {
        "booking.set_capacity"
    }

    fn request_id(&self) -> Uuid {
        self.request_id
    }
}

/// Command to admit a booking.
#[derive(Debug, Clone)]
pub struct AdmitBooking {
    /// Idempotency key; a resubmitted form returns the first booking.
    pub request_id: Uuid,
    /// The event to book.
    pub event_id: Uuid,
    /// The customer booking.
    pub requester_id: Uuid,
}

impl Command for AdmitBooking {
    fn command_type(&self) -> &'static str {
        "booking.admit"
    }

    fn request_id(&self) -> Uuid {
        self.request_id
    }
}

/// Command to cancel a pending booking.
#[derive(Debug, Clone)]
pub struct CancelBooking {
    /// Idempotency key.
    pub request_id: Uuid,
    /// The booking to cancel.
    pub booking_id: Uuid,
}

impl Command for CancelBooking {
    fn command_type(&self) -> &'static str {
        "booking.cancel"
    }

    fn request_id(&self) -> Uuid {
        self.request_id
    }
}
