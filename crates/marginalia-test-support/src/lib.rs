//! Shared test doubles and utilities for the Marginalia commerce core.

mod clock;
mod codes;
mod gateway;
mod signing;
mod store;

pub use clock::{FixedClock, fixed_now};
pub use codes::SequenceCodeGenerator;
pub use gateway::{FailingPaymentGateway, RecordingPaymentGateway};
pub use signing::sign_webhook;
pub use store::{FailingCommerceStore, InMemoryCommerceStore, StoreState};
