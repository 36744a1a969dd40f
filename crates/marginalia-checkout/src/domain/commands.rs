//! Commands for the Checkout context.

use marginalia_core::command::Command;
use marginalia_core::model::{DomainKind, MinorUnits, OrderLine, VoucherApplication};
use uuid::Uuid;

/// Command to place a shop order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    /// Caller-supplied idempotency key.
    pub request_id: Uuid,
    /// The customer.
    pub requester_id: Uuid,
    /// What is being bought.
    pub lines: Vec<OrderLine>,
    /// A voucher to put towards the order.
    pub voucher: Option<VoucherApplication>,
}

impl Command for PlaceOrder {
    fn command_type(&self) -> &'static str {
        "checkout.place_order"
    }

    fn request_id(&self) -> Uuid {
        self.request_id
    }
}

/// Command to open a payment session for a pending record.
#[derive(Debug, Clone)]
pub struct IssueCheckout {
    /// Kind of record paid for.
    pub kind: DomainKind,
    /// The record.
    pub domain_id: Uuid,
    /// Amount to charge; must equal the record's amount due.
    pub amount: MinorUnits,
    /// ISO currency code.
    pub currency: String,
    /// Description shown on the provider's page.
    pub description: String,
    /// Receipt email.
    pub contact_email: String,
}
