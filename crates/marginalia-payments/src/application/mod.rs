//! Application layer for the Payments context.

pub mod command_handlers;
pub mod query_handlers;
