//! Marginalia: Inventory bounded context.
//!
//! Each product has a stored stock counter and an append-only movement log.
//! The counter is authoritative; it always equals the sum of the logged
//! deltas because both are written in the same unit of work.

pub mod application;
pub mod domain;
