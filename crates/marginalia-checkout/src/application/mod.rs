//! Application layer for the Checkout context.

pub mod command_handlers;
mod payable;
pub mod query_handlers;
