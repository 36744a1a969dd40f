//! Commands for the Gift Voucher context.

use chrono::{DateTime, Utc};
use marginalia_core::command::Command;
use marginalia_core::model::MinorUnits;
use uuid::Uuid;

/// Command to issue a voucher.
#[derive(Debug, Clone)]
pub struct IssueVoucher {
    /// The new voucher's id; doubles as the idempotency key.
    pub voucher_id: Uuid,
    /// Stored value.
    pub amount: MinorUnits,
    /// Customer who paid for it, if any.
    pub buyer_id: Option<Uuid>,
    /// Who it is for.
    pub recipient: Option<String>,
    /// When it stops being redeemable.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Command for IssueVoucher {
    fn command_type(&self) -> &'static str {
        "vouchers.issue"
    }

    fn request_id(&self) -> Uuid {
        self.voucher_id
    }
}

/// Command to redeem part or all of a voucher.
#[derive(Debug, Clone)]
pub struct RedeemVoucher {
    /// Idempotency key for this redemption.
    pub redemption_id: Uuid,
    /// Voucher code as typed.
    pub code: String,
    /// Amount to take.
    pub amount: MinorUnits,
}

impl Command for RedeemVoucher {
    fn command_type(&self) -> &'static str {
        "vouchers.redeem"
    }

    fn request_id(&self) -> Uuid {
        self.redemption_id
    }
}
