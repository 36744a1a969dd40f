//! Marginalia: Event Booking bounded context.
//!
//! Admits bookings against an event's fixed capacity. The capacity check and
//! the booking insert happen under the event's row lock, so concurrent
//! admissions can never both see the last free place.

pub mod application;
pub mod domain;
