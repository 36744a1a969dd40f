//! Application layer for the Gift Voucher context.

pub mod command_handlers;
pub mod query_handlers;
