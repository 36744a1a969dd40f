//! Domain layer for the Inventory context.

pub mod commands;
pub mod stock;
