//! Application layer for the Event Booking context.

pub mod command_handlers;
pub mod query_handlers;
