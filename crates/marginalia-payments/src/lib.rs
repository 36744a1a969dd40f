//! Marginalia: Payments bounded context.
//!
//! Turns payment provider notifications, and the customer's return from the
//! provider's page, into `pending -> paid` and `pending -> cancelled`
//! transitions. Both channels go through the same apply path: each delivery
//! is recorded under its external event id in the same transaction as its
//! effects, so a redelivery finds the id taken and applies nothing.

pub mod application;
pub mod domain;
