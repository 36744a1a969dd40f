//! Marginalia: Gift Voucher bounded context.
//!
//! A voucher's remaining amount only ever goes down after issuance and never
//! below zero. Redemptions lock the voucher row, so concurrent partial
//! redemptions of the same code are applied one at a time.

pub mod application;
pub mod domain;
