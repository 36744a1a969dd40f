//! Order placement rules.

use marginalia_core::codes::normalize_code;
use marginalia_core::error::DomainError;
use marginalia_core::model::{MinorUnits, OrderLine, VoucherApplication};
use marginalia_vouchers::domain::ledger::RedeemRejection;
use uuid::Uuid;

/// Result of placing an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOrderOutcome {
    /// The order exists in `pending` status.
    Placed {
        /// The order.
        order_id: Uuid,
        /// What the customer still has to pay.
        amount_due: MinorUnits,
        /// `true` when this request id had already placed the order.
        replayed: bool,
    },
    /// The voucher cannot cover what was asked of it. No order was created.
    VoucherRejected(RedeemRejection),
}

/// Validates order lines and returns the order total.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty order, a non-positive
/// quantity, unit price or voucher amount, or a total that overflows.
pub fn order_total(lines: &[OrderLine]) -> Result<MinorUnits, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::Validation("an order needs at least one line".into()));
    }

    let mut total: MinorUnits = 0;
    for line in lines {
        let line_total = match line {
            OrderLine::Product {
                quantity,
                unit_price,
                ..
            } => {
                if *quantity <= 0 {
                    return Err(DomainError::Validation(format!(
                        "quantity must be positive, got {quantity}"
                    )));
                }
                if *unit_price <= 0 {
                    return Err(DomainError::Validation(format!(
                        "unit price must be positive, got {unit_price}"
                    )));
                }
                MinorUnits::from(*quantity).checked_mul(*unit_price)
            }
            OrderLine::GiftVoucher { amount, .. } => {
                if *amount <= 0 {
                    return Err(DomainError::Validation(format!(
                        "gift voucher amount must be positive, got {amount}"
                    )));
                }
                Some(*amount)
            }
        };
        total = line_total
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| DomainError::Validation("order total overflows".into()))?;
    }
    Ok(total)
}

/// Normalizes and validates a voucher application against the order total.
/// Something must be left to pay through the provider, so the voucher may
/// not cover the whole order.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank code, a non-positive
/// amount, or an amount not below `total`.
pub fn normalize_voucher(
    voucher: Option<&VoucherApplication>,
    total: MinorUnits,
) -> Result<Option<VoucherApplication>, DomainError> {
    let Some(voucher) = voucher else {
        return Ok(None);
    };
    let code = normalize_code(&voucher.code);
    if code.is_empty() {
        return Err(DomainError::Validation("voucher code is blank".into()));
    }
    if voucher.amount <= 0 {
        return Err(DomainError::Validation(format!(
            "voucher amount must be positive, got {}",
            voucher.amount
        )));
    }
    if voucher.amount >= total {
        return Err(DomainError::Validation(format!(
            "voucher amount {} must be below the order total {total}",
            voucher.amount
        )));
    }
    Ok(Some(VoucherApplication {
        code,
        amount: voucher.amount,
    }))
}
