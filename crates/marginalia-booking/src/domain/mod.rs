//! Domain layer for the Event Booking context.

pub mod admission;
pub mod commands;
