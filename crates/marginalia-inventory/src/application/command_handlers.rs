//! Command handlers for the Inventory context.
//!
//! [`adjust_within`] works on a caller's unit of work so the payment
//! reconciler can decrement stock inside an order's paid transition;
//! [`handle_adjust_stock`] wraps it in a unit of its own.

use chrono::{DateTime, Utc};
use marginalia_core::actor::{Actor, StaffRole};
use marginalia_core::clock::Clock;
use marginalia_core::command::Command;
use marginalia_core::error::DomainError;
use marginalia_core::model::StockMovement;
use marginalia_core::store::{CommerceStore, UnitOfWork};
use tracing::{info, instrument};

use crate::domain::commands::AdjustStock;
use crate::domain::stock::{self, AdjustOutcome};

/// Applies a stock movement inside `uow`. The product's counter is locked
/// before it is read, so the non-negativity check and the write cannot
/// interleave with another adjustment of the same product.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a zero delta or blank reason;
/// a would-be negative balance comes back as [`AdjustOutcome::Rejected`].
pub async fn adjust_within(
    uow: &mut dyn UnitOfWork,
    command: &AdjustStock,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<AdjustOutcome, DomainError> {
    stock::validate_adjustment(command.delta, &command.reason)?;

    let balance = uow.lock_stock(command.product_id).await?;
    if let Some(applied) = uow.find_stock_movement(command.movement_id).await? {
        return Ok(AdjustOutcome::Applied {
            balance: applied.balance_after,
            replayed: true,
        });
    }

    let next = match stock::next_balance(balance, command.delta) {
        Ok(next) => next,
        Err(rejection) => return Ok(AdjustOutcome::Rejected(rejection)),
    };

    uow.apply_stock_movement(&StockMovement {
        id: command.movement_id,
        product_id: command.product_id,
        delta: command.delta,
        reason: command.reason.trim().to_owned(),
        actor: actor.id.clone(),
        balance_after: next,
        occurred_at: now,
    })
    .await?;

    Ok(AdjustOutcome::Applied {
        balance: next,
        replayed: false,
    })
}

/// Handles the `AdjustStock` command.
///
/// # Errors
///
/// Returns `DomainError::Unauthorized` unless the actor is an admin, plus
/// the errors of [`adjust_within`].
#[instrument(skip_all, fields(product_id = %command.product_id, delta = command.delta))]
pub async fn handle_adjust_stock(
    command: &AdjustStock,
    actor: &Actor,
    clock: &dyn Clock,
    store: &dyn CommerceStore,
) -> Result<AdjustOutcome, DomainError> {
    actor.require("adjust stock", &[StaffRole::Admin])?;

    let mut uow = store.begin().await?;
    let outcome = adjust_within(uow.as_mut(), command, actor, clock.now()).await?;
    match &outcome {
        AdjustOutcome::Applied { balance, replayed } => {
            uow.commit().await?;
            info!(
                command = command.command_type(),
                actor = %actor,
                reason = %command.reason,
                balance,
                replayed,
                "stock adjusted"
            );
        }
        // Dropping the unit discards the counter row `lock_stock` may have created.
        AdjustOutcome::Rejected(rejection) => {
            info!(
                command = command.command_type(),
                actor = %actor,
                ?rejection,
                "stock adjustment rejected"
            );
        }
    }
    Ok(outcome)
}
