//! Query handlers for the Gift Voucher context.

use chrono::{DateTime, Utc};
use marginalia_core::actor::{Actor, StaffRole};
use marginalia_core::codes::normalize_code;
use marginalia_core::error::DomainError;
use marginalia_core::model::{MinorUnits, VoucherStatus};
use marginalia_core::store::CommerceStore;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::ledger;

/// Read-only view of a voucher.
#[derive(Debug, Serialize)]
pub struct VoucherView {
    /// The voucher identifier.
    pub voucher_id: Uuid,
    /// Redemption code.
    pub code: String,
    /// Value at issue.
    pub amount_initial: MinorUnits,
    /// Value left.
    pub amount_remaining: MinorUnits,
    /// Status as of now; an active voucher past its expiry reads as expired.
    pub status: VoucherStatus,
    /// Who it is for.
    pub recipient: Option<String>,
    /// Expiry, if any.
    pub expires_at: Option<DateTime<Utc>>,
    /// When it was issued.
    pub issued_at: DateTime<Utc>,
}

/// Looks a voucher up by code.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` unless the actor is admin or
/// point-of-sale, and `DomainError::NotFound` for an unknown code.
pub async fn get_voucher(
    code: &str,
    actor: &Actor,
    now: DateTime<Utc>,
    store: &dyn CommerceStore,
) -> Result<VoucherView, DomainError> {
    actor.require("look up vouchers", &[StaffRole::Admin, StaffRole::PointOfSale])?;

    let code = normalize_code(code);
    let mut uow = store.begin().await?;
    let voucher = uow
        .find_voucher_by_code(&code)
        .await?
        .ok_or_else(|| DomainError::not_found("voucher", &code))?;

    let status = if voucher.status == VoucherStatus::Active && ledger::is_expired(&voucher, now) {
        VoucherStatus::Expired
    } else {
        voucher.status
    };
    Ok(VoucherView {
        voucher_id: voucher.id,
        code: voucher.code,
        amount_initial: voucher.amount_initial,
        amount_remaining: voucher.amount_remaining,
        status,
        recipient: voucher.recipient,
        expires_at: voucher.expires_at,
        issued_at: voucher.issued_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use marginalia_core::model::VoucherRecord;
    use marginalia_test_support::{InMemoryCommerceStore, fixed_now};

    async fn seeded() -> InMemoryCommerceStore {
        let store = InMemoryCommerceStore::new();
        store
            .seed(|state| {
                state.vouchers.push(VoucherRecord {
                    id: Uuid::new_v4(),
                    code: "GIFT-AAAA-0001".into(),
                    amount_initial: 5_000,
                    amount_remaining: 2_000,
                    status: VoucherStatus::Active,
                    buyer_id: None,
                    recipient: None,
                    expires_at: Some(fixed_now() + Duration::days(10)),
                    issued_at: fixed_now(),
                });
            })
            .await;
        store
    }

    #[tokio::test]
    async fn test_get_voucher_normalizes_code() {
        let store = seeded().await;
        let till = Actor::new("till-1", StaffRole::PointOfSale);

        let view = get_voucher(" gift-aaaa-0001 ", &till, fixed_now(), &store)
            .await
            .unwrap();

        assert_eq!(view.amount_remaining, 2_000);
        assert_eq!(view.status, VoucherStatus::Active);
    }

    #[tokio::test]
    async fn test_get_voucher_reports_expiry_before_sweep() {
        let store = seeded().await;
        let admin = Actor::new("admin", StaffRole::Admin);

        let view = get_voucher("GIFT-AAAA-0001", &admin, fixed_now() + Duration::days(11), &store)
            .await
            .unwrap();

        assert_eq!(view.status, VoucherStatus::Expired);
        assert_eq!(store.snapshot().await.vouchers[0].status, VoucherStatus::Active);
    }

    #[tokio::test]
    async fn test_get_voucher_unknown_code() {
        let store = seeded().await;
        let admin = Actor::new("admin", StaffRole::Admin);

        let result = get_voucher("GIFT-NONE", &admin, fixed_now(), &store).await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }
}
