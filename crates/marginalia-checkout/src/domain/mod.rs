//! Domain layer for the Checkout context.

pub mod commands;
pub mod issuance;
pub mod orders;
