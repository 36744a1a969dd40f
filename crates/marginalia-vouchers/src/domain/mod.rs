//! Domain layer for the Gift Voucher context.

pub mod commands;
pub mod ledger;
