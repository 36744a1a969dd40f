//! Query handlers for the Checkout context.

use chrono::{DateTime, Utc};
use marginalia_core::error::DomainError;
use marginalia_core::model::{
    DomainKind, MinorUnits, OrderLine, RecordStatus, VoucherApplication,
};
use marginalia_core::store::CommerceStore;
use serde::Serialize;
use uuid::Uuid;

use super::payable;

/// What a booking or order still costs.
#[derive(Debug, Clone, Serialize)]
pub struct AmountDueView {
    /// Kind of record.
    pub kind: DomainKind,
    /// The record.
    pub domain_id: Uuid,
    /// Current status.
    pub status: RecordStatus,
    /// Amount to charge through the provider.
    pub amount_due: MinorUnits,
}

/// Read-only view of an order.
#[derive(Debug, Serialize)]
pub struct OrderView {
    /// The order identifier.
    pub order_id: Uuid,
    /// The customer.
    pub requester_id: Uuid,
    /// Current status.
    pub status: RecordStatus,
    /// What was bought.
    pub lines: Vec<OrderLine>,
    /// Sum of line totals.
    pub total: MinorUnits,
    /// Voucher put towards the order.
    pub voucher: Option<VoucherApplication>,
    /// Amount to charge through the provider.
    pub amount_due: MinorUnits,
    /// Provider payment id once paid.
    pub payment_confirmation_id: Option<String>,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}

/// Returns what a record costs.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the record does not exist.
pub async fn amount_due(
    kind: DomainKind,
    domain_id: Uuid,
    store: &dyn CommerceStore,
) -> Result<AmountDueView, DomainError> {
    let mut uow = store.begin().await?;
    let record = payable::load(uow.as_mut(), kind, domain_id, false)
        .await?
        .ok_or_else(|| DomainError::not_found(kind.as_str(), domain_id))?;
    Ok(AmountDueView {
        kind,
        domain_id,
        status: record.status,
        amount_due: record.amount_due,
    })
}

/// Retrieves an order with its lines.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no such order exists.
pub async fn get_order(order_id: Uuid, store: &dyn CommerceStore) -> Result<OrderView, DomainError> {
    let mut uow = store.begin().await?;
    let order = uow
        .find_order(order_id)
        .await?
        .ok_or_else(|| DomainError::not_found("order", order_id))?;
    let lines = uow.order_lines(order_id).await?;
    Ok(OrderView {
        amount_due: order.amount_due(),
        order_id: order.id,
        requester_id: order.requester_id,
        status: order.status,
        lines,
        total: order.total,
        voucher: order.voucher,
        payment_confirmation_id: order.payment_confirmation_id,
        created_at: order.created_at,
    })
}
