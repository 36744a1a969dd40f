//! Domain layer for the Payments context.

pub mod notification;
pub mod outcome;
pub mod signature;
pub mod transition;
