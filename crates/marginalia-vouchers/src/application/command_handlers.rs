//! Command handlers for the Gift Voucher context.
//!
//! `issue_within` and `redeem_within` operate on a caller's unit of work so
//! the payment reconciler can apply them inside an order's paid transition.
//! The `handle_*` functions wrap them in a unit of their own.

use chrono::{DateTime, Utc};
use marginalia_core::actor::{Actor, StaffRole};
use marginalia_core::clock::Clock;
use marginalia_core::codes::{CodeGenerator, normalize_code};
use marginalia_core::command::Command;
use marginalia_core::error::DomainError;
use marginalia_core::model::{MinorUnits, VoucherRecord, VoucherRedemption};
use marginalia_core::store::{CommerceStore, UnitOfWork};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::commands::{IssueVoucher, RedeemVoucher};
use crate::domain::ledger::{self, RedeemOutcome, RedeemRejection};

/// Attempts at drawing an unused code before giving up.
const CODE_ATTEMPTS: usize = 5;

/// What to issue.
#[derive(Debug, Clone)]
pub struct VoucherDraft {
    /// Voucher id.
    pub voucher_id: Uuid,
    /// Stored value.
    pub amount: MinorUnits,
    /// Customer who paid for it.
    pub buyer_id: Option<Uuid>,
    /// Who it is for.
    pub recipient: Option<String>,
    /// When it stops being redeemable.
    pub expires_at: Option<DateTime<Utc>>,
}

/// What to redeem.
#[derive(Debug, Clone)]
pub struct RedemptionDraft<'a> {
    /// Idempotency key.
    pub redemption_id: Uuid,
    /// Normalized voucher code.
    pub code: &'a str,
    /// Amount to take.
    pub amount: MinorUnits,
    /// Order paid for, when redeemed by the reconciler.
    pub order_id: Option<Uuid>,
    /// Who is redeeming.
    pub actor: &'a Actor,
}

/// Issues a voucher inside `uow`, drawing codes until an unused one is
/// found. Re-issuing an existing voucher id returns the stored voucher.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an invalid amount or expiry and
/// `DomainError::Conflict` if no unused code could be drawn.
pub async fn issue_within(
    uow: &mut dyn UnitOfWork,
    draft: VoucherDraft,
    codes: &dyn CodeGenerator,
    now: DateTime<Utc>,
) -> Result<VoucherRecord, DomainError> {
    if let Some(existing) = uow.find_voucher(draft.voucher_id).await? {
        return Ok(existing);
    }

    for _ in 0..CODE_ATTEMPTS {
        let voucher = ledger::new_voucher(
            draft.voucher_id,
            normalize_code(&codes.next_code()),
            draft.amount,
            draft.buyer_id,
            draft.recipient.clone(),
            draft.expires_at,
            now,
        )?;
        if uow.insert_voucher(&voucher).await? {
            return Ok(voucher);
        }
        warn!(voucher_id = %draft.voucher_id, "voucher code collision, drawing another");
    }

    Err(DomainError::Conflict(format!(
        "no unused voucher code after {CODE_ATTEMPTS} attempts"
    )))
}

/// Redeems a voucher inside `uow`. The voucher row is locked before its
/// balance is read, so the check and the decrement cannot interleave with
/// another redemption of the same code.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a non-positive amount; business
/// rejections come back as [`RedeemOutcome::Rejected`].
pub async fn redeem_within(
    uow: &mut dyn UnitOfWork,
    draft: &RedemptionDraft<'_>,
    now: DateTime<Utc>,
) -> Result<RedeemOutcome, DomainError> {
    ledger::validate_amount(draft.amount)?;

    let Some(mut voucher) = uow.lock_voucher_by_code(draft.code).await? else {
        return Ok(RedeemOutcome::Rejected(RedeemRejection::NotFound));
    };

    // Looked up under the voucher lock so a concurrent first attempt has
    // either committed or rolled back by now.
    if let Some(applied) = uow.find_redemption(draft.redemption_id).await? {
        return Ok(RedeemOutcome::Applied {
            remaining: applied.remaining_after,
            replayed: true,
        });
    }

    let before = voucher.status;
    match ledger::apply_redemption(&mut voucher, draft.amount, now) {
        Ok(remaining) => {
            uow.update_voucher(&voucher).await?;
            uow.insert_redemption(&VoucherRedemption {
                id: draft.redemption_id,
                voucher_id: voucher.id,
                amount: draft.amount,
                remaining_after: remaining,
                order_id: draft.order_id,
                actor: draft.actor.id.clone(),
                redeemed_at: now,
            })
            .await?;
            Ok(RedeemOutcome::Applied {
                remaining,
                replayed: false,
            })
        }
        Err(rejection) => {
            if voucher.status != before {
                uow.update_voucher(&voucher).await?;
            }
            Ok(RedeemOutcome::Rejected(rejection))
        }
    }
}

/// Handles the `IssueVoucher` command.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` unless the actor is admin or
/// point-of-sale, plus the errors of [`issue_within`].
#[instrument(skip_all, fields(voucher_id = %command.voucher_id))]
pub async fn handle_issue_voucher(
    command: &IssueVoucher,
    actor: &Actor,
    clock: &dyn Clock,
    codes: &dyn CodeGenerator,
    store: &dyn CommerceStore,
) -> Result<VoucherRecord, DomainError> {
    actor.require("issue vouchers", &[StaffRole::Admin, StaffRole::PointOfSale])?;

    let mut uow = store.begin().await?;
    let voucher = issue_within(
        uow.as_mut(),
        VoucherDraft {
            voucher_id: command.voucher_id,
            amount: command.amount,
            buyer_id: command.buyer_id,
            recipient: command.recipient.clone(),
            expires_at: command.expires_at,
        },
        codes,
        clock.now(),
    )
    .await?;
    uow.commit().await?;

    info!(
        command = command.command_type(),
        actor = %actor,
        amount = voucher.amount_initial,
        "voucher issued"
    );
    Ok(voucher)
}

/// Handles the `RedeemVoucher` command.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` unless the actor is admin or
/// point-of-sale, plus the errors of [`redeem_within`].
#[instrument(skip_all, fields(redemption_id = %command.redemption_id))]
pub async fn handle_redeem_voucher(
    command: &RedeemVoucher,
    actor: &Actor,
    clock: &dyn Clock,
    store: &dyn CommerceStore,
) -> Result<RedeemOutcome, DomainError> {
    actor.require("redeem vouchers", &[StaffRole::Admin, StaffRole::PointOfSale])?;

    let code = normalize_code(&command.code);
    let mut uow = store.begin().await?;
    let outcome = redeem_within(
        uow.as_mut(),
        &RedemptionDraft {
            redemption_id: command.redemption_id,
            code: &code,
            amount: command.amount,
            order_id: None,
            actor,
        },
        clock.now(),
    )
    .await?;
    // Also commits the expired-status flip of a rejected redemption.
    uow.commit().await?;

    match &outcome {
        RedeemOutcome::Applied { remaining, replayed } => info!(
            command = command.command_type(),
            actor = %actor,
            amount = command.amount,
            remaining,
            replayed,
            "voucher redeemed"
        ),
        RedeemOutcome::Rejected(rejection) => info!(
            command = command.command_type(),
            actor = %actor,
            ?rejection,
            "voucher redemption rejected"
        ),
    }
    Ok(outcome)
}

/// Marks every voucher past its expiry as `expired`. Housekeeping only:
/// redemption checks expiry at read time regardless.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` for point-of-sale callers.
pub async fn handle_expire_vouchers(
    actor: &Actor,
    clock: &dyn Clock,
    store: &dyn CommerceStore,
) -> Result<u64, DomainError> {
    actor.require("expire vouchers", &[StaffRole::Admin, StaffRole::System])?;

    let mut uow = store.begin().await?;
    let expired = uow.expire_vouchers(clock.now()).await?;
    uow.commit().await?;

    if expired > 0 {
        info!(expired, "vouchers expired");
    }
    Ok(expired)
}
