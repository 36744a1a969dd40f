//! Row types and their conversion into records.

use chrono::{DateTime, Utc};
use marginalia_core::error::DomainError;
use marginalia_core::model::{
    BookingRecord, CheckoutSessionRecord, EventRecord, FlaggedPaymentEvent, OrderRecord,
    StockMovement, VoucherApplication, VoucherRecord, VoucherRedemption,
};
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EventRow {
    id: Uuid,
    title: String,
    capacity: i32,
    unit_price: i64,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            capacity: row.capacity,
            unit_price: row.unit_price,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    event_id: Uuid,
    requester_id: Uuid,
    status: String,
    request_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for BookingRecord {
    type Error = DomainError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            event_id: row.event_id,
            requester_id: row.requester_id,
            status: row.status.parse()?,
            request_id: row.request_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OrderRow {
    id: Uuid,
    requester_id: Uuid,
    status: String,
    total: i64,
    voucher_code: Option<String>,
    voucher_amount: Option<i64>,
    request_id: Uuid,
    external_session_id: Option<String>,
    payment_confirmation_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let voucher = match (row.voucher_code, row.voucher_amount) {
            (Some(code), Some(amount)) => Some(VoucherApplication { code, amount }),
            _ => None,
        };
        Ok(Self {
            id: row.id,
            requester_id: row.requester_id,
            status: row.status.parse()?,
            total: row.total,
            voucher,
            request_id: row.request_id,
            external_session_id: row.external_session_id,
            payment_confirmation_id: row.payment_confirmation_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SessionRow {
    session_id: String,
    kind: String,
    domain_id: Uuid,
    requester_id: Uuid,
    amount: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for CheckoutSessionRecord {
    type Error = DomainError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            session_id: row.session_id,
            kind: row.kind.parse()?,
            domain_id: row.domain_id,
            requester_id: row.requester_id,
            amount: row.amount,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FlagRow {
    external_event_id: String,
    reason: String,
    detail: String,
    payload: serde_json::Value,
    flagged_at: DateTime<Utc>,
}

impl TryFrom<FlagRow> for FlaggedPaymentEvent {
    type Error = DomainError;

    fn try_from(row: FlagRow) -> Result<Self, Self::Error> {
        Ok(Self {
            external_event_id: row.external_event_id,
            reason: row.reason.parse()?,
            detail: row.detail,
            payload: row.payload,
            flagged_at: row.flagged_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct VoucherRow {
    id: Uuid,
    code: String,
    amount_initial: i64,
    amount_remaining: i64,
    status: String,
    buyer_id: Option<Uuid>,
    recipient: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    issued_at: DateTime<Utc>,
}

impl TryFrom<VoucherRow> for VoucherRecord {
    type Error = DomainError;

    fn try_from(row: VoucherRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            code: row.code,
            amount_initial: row.amount_initial,
            amount_remaining: row.amount_remaining,
            status: row.status.parse()?,
            buyer_id: row.buyer_id,
            recipient: row.recipient,
            expires_at: row.expires_at,
            issued_at: row.issued_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RedemptionRow {
    id: Uuid,
    voucher_id: Uuid,
    amount: i64,
    remaining_after: i64,
    order_id: Option<Uuid>,
    actor: String,
    redeemed_at: DateTime<Utc>,
}

impl From<RedemptionRow> for VoucherRedemption {
    fn from(row: RedemptionRow) -> Self {
        Self {
            id: row.id,
            voucher_id: row.voucher_id,
            amount: row.amount,
            remaining_after: row.remaining_after,
            order_id: row.order_id,
            actor: row.actor,
            redeemed_at: row.redeemed_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    delta: i64,
    reason: String,
    actor: String,
    balance_after: i64,
    occurred_at: DateTime<Utc>,
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            delta: row.delta,
            reason: row.reason,
            actor: row.actor,
            balance_after: row.balance_after,
            occurred_at: row.occurred_at,
        }
    }
}
