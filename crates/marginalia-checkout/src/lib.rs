//! Marginalia: Checkout bounded context.
//!
//! Places shop orders and issues external payment sessions for pending
//! bookings and orders. Every session carries `{kind, domain_id,
//! requester_id}` metadata, which is how payment notifications find their
//! way back to the record they pay for.

pub mod application;
pub mod domain;
