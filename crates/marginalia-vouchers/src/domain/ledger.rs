//! Voucher ledger rules.
//!
//! `0 <= amount_remaining <= amount_initial` holds for every voucher, and
//! `amount_remaining` only changes through [`apply_redemption`].

use chrono::{DateTime, Utc};
use marginalia_core::error::DomainError;
use marginalia_core::model::{MinorUnits, VoucherRecord, VoucherStatus};
use serde::Serialize;
use uuid::Uuid;

/// Why a redemption was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RedeemRejection {
    /// No voucher with that code.
    NotFound,
    /// The voucher is past its expiry.
    Expired,
    /// The amount asked for is more than what is left.
    InsufficientBalance {
        /// What is left on the voucher.
        remaining: MinorUnits,
    },
}

/// Result of a redemption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// The amount was taken off the voucher.
    Applied {
        /// Balance left afterwards.
        remaining: MinorUnits,
        /// `true` when this redemption id had already been applied.
        replayed: bool,
    },
    /// Nothing was taken.
    Rejected(RedeemRejection),
}

/// Builds a freshly issued voucher.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a non-positive amount or an expiry
/// that is not in the future.
pub fn new_voucher(
    id: Uuid,
    code: String,
    amount: MinorUnits,
    buyer_id: Option<Uuid>,
    recipient: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<VoucherRecord, DomainError> {
    if amount <= 0 {
        return Err(DomainError::Validation(format!(
            "voucher amount must be positive, got {amount}"
        )));
    }
    if expires_at.is_some_and(|at| at <= now) {
        return Err(DomainError::Validation(
            "voucher expiry must be in the future".into(),
        ));
    }
    Ok(VoucherRecord {
        id,
        code,
        amount_initial: amount,
        amount_remaining: amount,
        status: VoucherStatus::Active,
        buyer_id,
        recipient,
        expires_at,
        issued_at: now,
    })
}

/// Returns `true` once the voucher may no longer be redeemed because of time.
#[must_use]
pub fn is_expired(voucher: &VoucherRecord, now: DateTime<Utc>) -> bool {
    voucher.status == VoucherStatus::Expired || voucher.expires_at.is_some_and(|at| at <= now)
}

/// Checks a redemption without applying it.
///
/// # Errors
///
/// Returns the rejection `apply_redemption` would produce.
pub fn check_redeemable(
    voucher: &VoucherRecord,
    amount: MinorUnits,
    now: DateTime<Utc>,
) -> Result<(), RedeemRejection> {
    if is_expired(voucher, now) {
        return Err(RedeemRejection::Expired);
    }
    if amount > voucher.amount_remaining {
        return Err(RedeemRejection::InsufficientBalance {
            remaining: voucher.amount_remaining,
        });
    }
    Ok(())
}

/// Takes `amount` off the voucher. The voucher becomes `redeemed` when the
/// balance reaches zero.
///
/// An expired-by-time voucher that is still `active` is switched to
/// `expired` even though the redemption is rejected; callers persist that
/// status change.
///
/// # Errors
///
/// Returns `RedeemRejection::Expired` or
/// `RedeemRejection::InsufficientBalance`; the balance is untouched.
pub fn apply_redemption(
    voucher: &mut VoucherRecord,
    amount: MinorUnits,
    now: DateTime<Utc>,
) -> Result<MinorUnits, RedeemRejection> {
    if let Err(rejection) = check_redeemable(voucher, amount, now) {
        if rejection == RedeemRejection::Expired && voucher.status == VoucherStatus::Active {
            voucher.status = VoucherStatus::Expired;
        }
        return Err(rejection);
    }

    voucher.amount_remaining -= amount;
    if voucher.amount_remaining == 0 {
        voucher.status = VoucherStatus::Redeemed;
    }
    Ok(voucher.amount_remaining)
}

/// Validates a requested redemption amount.
///
/// # Errors
///
/// Returns `DomainError::Validation` unless `amount` is positive.
pub fn validate_amount(amount: MinorUnits) -> Result<(), DomainError> {
    if amount <= 0 {
        return Err(DomainError::Validation(format!(
            "redemption amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use marginalia_test_support::fixed_now;

    fn voucher(amount: MinorUnits) -> VoucherRecord {
        new_voucher(
            Uuid::new_v4(),
            "GIFT-TEST-0001".into(),
            amount,
            None,
            None,
            Some(fixed_now() + Duration::days(30)),
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn test_partial_then_overdrawn_redemption() {
        let mut v = voucher(5_000);

        assert_eq!(apply_redemption(&mut v, 3_000, fixed_now()), Ok(2_000));
        assert_eq!(
            apply_redemption(&mut v, 2_500, fixed_now()),
            Err(RedeemRejection::InsufficientBalance { remaining: 2_000 })
        );
        assert_eq!(v.amount_remaining, 2_000);
        assert_eq!(v.status, VoucherStatus::Active);
    }

    #[test]
    fn test_redeeming_full_balance_marks_redeemed() {
        let mut v = voucher(1_500);

        assert_eq!(apply_redemption(&mut v, 1_500, fixed_now()), Ok(0));
        assert_eq!(v.status, VoucherStatus::Redeemed);
        assert_eq!(
            apply_redemption(&mut v, 1, fixed_now()),
            Err(RedeemRejection::InsufficientBalance { remaining: 0 })
        );
    }

    #[test]
    fn test_redeeming_after_expiry_flips_status_and_keeps_balance() {
        let mut v = voucher(1_000);
        let later = fixed_now() + Duration::days(31);

        assert_eq!(
            apply_redemption(&mut v, 100, later),
            Err(RedeemRejection::Expired)
        );
        assert_eq!(v.status, VoucherStatus::Expired);
        assert_eq!(v.amount_remaining, 1_000);
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let v = voucher(1_000);
        let at_expiry = v.expires_at.unwrap();
        assert!(is_expired(&v, at_expiry));
        assert!(!is_expired(&v, at_expiry - Duration::seconds(1)));
    }

    #[test]
    fn test_new_voucher_rejects_non_positive_amount() {
        let result = new_voucher(
            Uuid::new_v4(),
            "GIFT-X".into(),
            0,
            None,
            None,
            None,
            fixed_now(),
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_new_voucher_rejects_past_expiry() {
        let result = new_voucher(
            Uuid::new_v4(),
            "GIFT-X".into(),
            100,
            None,
            None,
            Some(fixed_now() - Duration::days(1)),
            fixed_now(),
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
