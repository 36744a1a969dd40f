//! Durable record types shared by every context.
//!
//! Each struct mirrors one table. Statuses are closed enums with a stable
//! text form so adapters can persist them as plain strings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Amounts are integers in the currency's minor unit (pence, cents).
pub type MinorUnits = i64;

macro_rules! text_enum {
    ($name:ident, $label:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the persisted text form.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(DomainError::Infrastructure(format!(
                        concat!("unknown ", $label, ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

/// Lifecycle of a booking or an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Awaiting payment.
    Pending,
    /// Payment confirmed. Terminal.
    Paid,
    /// Abandoned or cancelled. Terminal.
    Cancelled,
}

text_enum!(RecordStatus, "record status" {
    Pending => "pending",
    Paid => "paid",
    Cancelled => "cancelled",
});

impl RecordStatus {
    /// Returns `true` for `paid` and `cancelled`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Which kind of domain record a checkout session pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    /// An event booking.
    Booking,
    /// A shop order.
    Order,
}

text_enum!(DomainKind, "domain kind" {
    Booking => "booking",
    Order => "order",
});

/// A ticketed event with finite capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Event identifier.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Maximum number of non-cancelled bookings.
    pub capacity: i32,
    /// Price of one booking.
    pub unit_price: MinorUnits,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
}

/// One admission against an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingRecord {
    /// Booking identifier.
    pub id: Uuid,
    /// The event booked.
    pub event_id: Uuid,
    /// The customer who asked for the booking.
    pub requester_id: Uuid,
    /// Current status.
    pub status: RecordStatus,
    /// Caller-supplied idempotency key for the admission.
    pub request_id: Uuid,
    /// When the booking was admitted.
    pub created_at: DateTime<Utc>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

/// A line on a shop order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderLine {
    /// A stocked product. Paid orders decrement its inventory.
    Product {
        /// The product sold.
        product_id: Uuid,
        /// Number of units.
        quantity: i32,
        /// Price of one unit.
        unit_price: MinorUnits,
    },
    /// A gift voucher. Paid orders issue a new voucher.
    GiftVoucher {
        /// Stored value of the voucher.
        amount: MinorUnits,
        /// Who the voucher is for, as given by the buyer.
        recipient: Option<String>,
    },
}

impl OrderLine {
    /// Returns the line total.
    #[must_use]
    pub fn total(&self) -> MinorUnits {
        match self {
            Self::Product {
                quantity,
                unit_price,
                ..
            } => MinorUnits::from(*quantity) * unit_price,
            Self::GiftVoucher { amount, .. } => *amount,
        }
    }
}

/// A voucher applied against an order, redeemed when the order is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherApplication {
    /// Voucher code.
    pub code: String,
    /// Amount to take off the order.
    pub amount: MinorUnits,
}

/// A shop order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRecord {
    /// Order identifier.
    pub id: Uuid,
    /// The customer placing the order.
    pub requester_id: Uuid,
    /// Current status.
    pub status: RecordStatus,
    /// Sum of line totals.
    pub total: MinorUnits,
    /// Voucher applied against the order, if any.
    pub voucher: Option<VoucherApplication>,
    /// Caller-supplied idempotency key for placement.
    pub request_id: Uuid,
    /// Most recently issued payment session.
    pub external_session_id: Option<String>,
    /// Provider payment id. Set once when paid, immutable thereafter.
    pub payment_confirmation_id: Option<String>,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// When the order last changed.
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Amount the customer must pay through the provider.
    #[must_use]
    pub fn amount_due(&self) -> MinorUnits {
        self.total - self.voucher.as_ref().map_or(0, |v| v.amount)
    }
}

/// Status of one external payment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Issued, no outcome yet.
    Open,
    /// Paid.
    Complete,
    /// Abandoned, expired or failed.
    Expired,
}

text_enum!(SessionStatus, "session status" {
    Open => "open",
    Complete => "complete",
    Expired => "expired",
});

/// An external payment session issued for a pending record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSessionRecord {
    /// Provider-assigned session id.
    pub session_id: String,
    /// Kind of record paid for.
    pub kind: DomainKind,
    /// Id of the record paid for.
    pub domain_id: Uuid,
    /// The customer paying.
    pub requester_id: Uuid,
    /// Amount charged.
    pub amount: MinorUnits,
    /// Outcome, once known.
    pub status: SessionStatus,
    /// When the session was issued.
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a gift voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherStatus {
    /// Has a balance and has not expired.
    Active,
    /// Balance reached zero.
    Redeemed,
    /// Past its expiry time. Never reverts.
    Expired,
}

text_enum!(VoucherStatus, "voucher status" {
    Active => "active",
    Redeemed => "redeemed",
    Expired => "expired",
});

/// A stored-value voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoucherRecord {
    /// Voucher identifier.
    pub id: Uuid,
    /// Unique, immutable redemption code.
    pub code: String,
    /// Value at issuance.
    pub amount_initial: MinorUnits,
    /// Value left to spend.
    pub amount_remaining: MinorUnits,
    /// Current status.
    pub status: VoucherStatus,
    /// Customer who bought the voucher, if sold online.
    pub buyer_id: Option<Uuid>,
    /// Who the voucher is for.
    pub recipient: Option<String>,
    /// When the voucher stops being redeemable.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the voucher was issued.
    pub issued_at: DateTime<Utc>,
}

/// One applied redemption against a voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoucherRedemption {
    /// Caller-supplied redemption id (idempotency key).
    pub id: Uuid,
    /// The voucher drawn down.
    pub voucher_id: Uuid,
    /// Amount taken.
    pub amount: MinorUnits,
    /// Balance left after this redemption.
    pub remaining_after: MinorUnits,
    /// Order the redemption paid for, when made by the reconciler.
    pub order_id: Option<Uuid>,
    /// Who redeemed.
    pub actor: String,
    /// When the redemption was applied.
    pub redeemed_at: DateTime<Utc>,
}

/// One append-only entry in a product's stock log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockMovement {
    /// Movement identifier (idempotency key).
    pub id: Uuid,
    /// The product whose stock moved.
    pub product_id: Uuid,
    /// Signed change in units.
    pub delta: i64,
    /// Why the stock moved (`sale`, `delivery`, `stocktake`, …).
    pub reason: String,
    /// Who moved it.
    pub actor: String,
    /// Stored balance immediately after this movement.
    pub balance_after: i64,
    /// When the movement was applied.
    pub occurred_at: DateTime<Utc>,
}

/// A provider notification that has been consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedPaymentEvent {
    /// Provider-assigned event id (or `confirm:<session>` for redirects).
    pub external_event_id: String,
    /// Notification type as delivered.
    pub event_type: String,
    /// The session the notification was about.
    pub session_id: Option<String>,
    /// When it was consumed.
    pub processed_at: DateTime<Utc>,
}

/// Why a notification needs a human to look at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagReason {
    /// Metadata did not resolve to a record.
    Unroutable,
    /// Payment reported for a record that is already cancelled.
    Inconsistent,
    /// An order's ledger effects could not be applied.
    LedgerConflict,
    /// A paid record was charged again through another session.
    DuplicatePayment,
}

text_enum!(FlagReason, "flag reason" {
    Unroutable => "unroutable",
    Inconsistent => "inconsistent",
    LedgerConflict => "ledger_conflict",
    DuplicatePayment => "duplicate_payment",
});

/// A notification parked for operator review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedPaymentEvent {
    /// Provider-assigned event id.
    pub external_event_id: String,
    /// Why it was flagged.
    pub reason: FlagReason,
    /// Human-readable detail.
    pub detail: String,
    /// The notification as received.
    pub payload: serde_json::Value,
    /// When it was flagged.
    pub flagged_at: DateTime<Utc>,
}
