//! Route modules organized by bounded context.

pub mod bookings;
pub mod checkout;
pub mod events;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod payments;
pub mod vouchers;

#[cfg(test)]
pub(crate) mod test_support;
