//! Command handlers for the Payments context.
//!
//! [`handle_webhook`] and [`handle_confirm`] are two delivery channels for
//! the same outcome. Both end in `reconcile`, which records the delivery's
//! key and applies its effects in one unit of work under the record's row
//! lock. Whichever channel arrives first moves the record; the other finds
//! it already settled.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use marginalia_core::actor::Actor;
use marginalia_core::clock::Clock;
use marginalia_core::codes::CodeGenerator;
use marginalia_core::error::DomainError;
use marginalia_core::gateway::{PaymentGateway, RemotePaymentState, SessionMetadata};
use marginalia_core::model::{
    BookingRecord, CheckoutSessionRecord, DomainKind, FlagReason, FlaggedPaymentEvent,
    OrderLine, OrderRecord, ProcessedPaymentEvent, RecordStatus, SessionStatus,
};
use marginalia_core::store::{CommerceStore, UnitOfWork};
use marginalia_inventory::application::command_handlers::adjust_within;
use marginalia_inventory::domain::commands::AdjustStock;
use marginalia_inventory::domain::stock::AdjustOutcome;
use marginalia_vouchers::application::command_handlers::{
    RedemptionDraft, VoucherDraft, issue_within, redeem_within,
};
use marginalia_vouchers::domain::ledger::RedeemOutcome;
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::notification::{NotificationType, PaymentNotification};
use crate::domain::outcome::{IgnoreReason, ReconcileOutcome, RejectReason, Transition};
use crate::domain::signature::WebhookVerifier;
use crate::domain::transition::{self, FailedStep, PaidStep, RepeatStep, ReportedSession};

/// Collaborators shared by both delivery channels.
#[derive(Clone, Copy)]
pub struct ReconcileContext<'a> {
    /// Source of the current time.
    pub clock: &'a dyn Clock,
    /// Codes for vouchers bought in an order.
    pub codes: &'a dyn CodeGenerator,
    /// The store.
    pub store: &'a dyn CommerceStore,
    /// Lifetime of vouchers bought in an order.
    pub voucher_validity: Duration,
}

/// How the returning customer identifies what they paid for.
#[derive(Debug, Clone)]
pub enum ConfirmPayment {
    /// The session the provider redirected back from.
    Session {
        /// Provider session id.
        session_id: String,
    },
    /// The record; its most recent session is checked.
    Record {
        /// Kind of record.
        kind: DomainKind,
        /// The record.
        domain_id: Uuid,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Paid,
    Failed,
}

/// One delivery, whichever channel it came through.
#[derive(Debug)]
struct Delivery {
    key: String,
    event_type: String,
    session_id: Option<String>,
    payment_id: Option<String>,
    metadata: BTreeMap<String, String>,
    payload: serde_json::Value,
}

enum LockedRecord {
    Booking(BookingRecord),
    Order(OrderRecord),
}

impl LockedRecord {
    fn status(&self) -> RecordStatus {
        match self {
            Self::Booking(booking) => booking.status,
            Self::Order(order) => order.status,
        }
    }

    fn requester_id(&self) -> Uuid {
        match self {
            Self::Booking(booking) => booking.requester_id,
            Self::Order(order) => order.requester_id,
        }
    }
}

/// Handles a payment provider notification.
///
/// The signature is checked before the body is even parsed; a missing or
/// invalid one is refused with nothing touched.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a correctly signed body that is not
/// a notification, and `DomainError::Infrastructure` if the store fails.
#[instrument(skip_all)]
pub async fn handle_webhook(
    body: &[u8],
    signature: Option<&str>,
    verifier: &WebhookVerifier,
    ctx: ReconcileContext<'_>,
) -> Result<ReconcileOutcome, DomainError> {
    let verified = signature
        .ok_or_else(|| DomainError::BadSignature("missing signature header".into()))
        .and_then(|header| verifier.verify(header, body, ctx.clock.now()));
    if let Err(err) = verified {
        warn!(operator_review = true, error = %err, "payment notification refused");
        return Ok(ReconcileOutcome::Rejected(RejectReason::BadSignature));
    }

    let notification = PaymentNotification::parse(body)?;
    let settlement = match &notification.notification_type {
        NotificationType::PaymentSucceeded => Settlement::Paid,
        NotificationType::PaymentFailed | NotificationType::SessionExpired => Settlement::Failed,
        NotificationType::Other(kind) => {
            return record_unsupported(&notification, kind, ctx).await;
        }
    };

    let delivery = Delivery {
        key: notification.external_event_id.clone(),
        event_type: notification.notification_type.as_str().to_owned(),
        session_id: notification.session_id,
        payment_id: notification.payment_id,
        metadata: notification.metadata,
        payload: serde_json::from_slice(body).unwrap_or_default(),
    };
    reconcile(&delivery, settlement, ctx).await
}

/// Handles the customer's return from the provider's page.
///
/// The session is read back from the provider and a paid or failed session
/// is reconciled under the key `confirm:<session_id>`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if a record has no session, and
/// `DomainError::Infrastructure` if the store or provider fails.
#[instrument(skip_all)]
pub async fn handle_confirm(
    request: &ConfirmPayment,
    gateway: &dyn PaymentGateway,
    ctx: ReconcileContext<'_>,
) -> Result<ReconcileOutcome, DomainError> {
    let session_id = match request {
        ConfirmPayment::Session { session_id } => session_id.clone(),
        ConfirmPayment::Record { kind, domain_id } => {
            let mut uow = ctx.store.begin().await?;
            uow.latest_checkout_session(*kind, *domain_id)
                .await?
                .ok_or_else(|| DomainError::not_found("checkout session", domain_id))?
                .session_id
        }
    };

    let snapshot = gateway.retrieve_session(&session_id).await?;
    let settlement = match snapshot.state {
        RemotePaymentState::Unpaid => {
            info!(%session_id, "customer returned before payment was captured");
            return Ok(ReconcileOutcome::Ignored(IgnoreReason::AwaitingPayment));
        }
        RemotePaymentState::Paid => Settlement::Paid,
        RemotePaymentState::Failed => Settlement::Failed,
    };

    let delivery = Delivery {
        key: format!("confirm:{session_id}"),
        event_type: match settlement {
            Settlement::Paid => "confirm.paid",
            Settlement::Failed => "confirm.failed",
        }
        .to_owned(),
        payload: json!({
            "session_id": session_id,
            "state": snapshot.state,
            "payment_id": snapshot.payment_id,
            "metadata": snapshot.metadata,
        }),
        session_id: Some(session_id),
        payment_id: snapshot.payment_id,
        metadata: snapshot.metadata,
    };
    reconcile(&delivery, settlement, ctx).await
}

async fn record_unsupported(
    notification: &PaymentNotification,
    kind: &str,
    ctx: ReconcileContext<'_>,
) -> Result<ReconcileOutcome, DomainError> {
    let mut uow = ctx.store.begin().await?;
    let fresh = uow
        .record_payment_event(&ProcessedPaymentEvent {
            external_event_id: notification.external_event_id.clone(),
            event_type: kind.to_owned(),
            session_id: notification.session_id.clone(),
            processed_at: ctx.clock.now(),
        })
        .await?;
    if !fresh {
        return Ok(ReconcileOutcome::Ignored(IgnoreReason::Duplicate));
    }
    uow.commit().await?;
    info!(external_event_id = %notification.external_event_id, kind, "notification type not handled");
    Ok(ReconcileOutcome::Ignored(IgnoreReason::Unsupported))
}

#[instrument(skip_all, fields(key = %delivery.key, event_type = %delivery.event_type))]
async fn reconcile(
    delivery: &Delivery,
    settlement: Settlement,
    ctx: ReconcileContext<'_>,
) -> Result<ReconcileOutcome, DomainError> {
    let metadata = match SessionMetadata::from_map(&delivery.metadata) {
        Ok(metadata) => metadata,
        Err(err) => return flag_unroutable(delivery, &err.to_string(), ctx).await,
    };
    let now = ctx.clock.now();

    let mut uow = ctx.store.begin().await?;
    let fresh = uow
        .record_payment_event(&ProcessedPaymentEvent {
            external_event_id: delivery.key.clone(),
            event_type: delivery.event_type.clone(),
            session_id: delivery.session_id.clone(),
            processed_at: now,
        })
        .await?;
    if !fresh {
        info!("delivery already processed");
        return Ok(ReconcileOutcome::Ignored(IgnoreReason::Duplicate));
    }

    let locked = match metadata.kind {
        DomainKind::Booking => uow
            .lock_booking(metadata.domain_id)
            .await?
            .map(LockedRecord::Booking),
        DomainKind::Order => uow
            .lock_order(metadata.domain_id)
            .await?
            .map(LockedRecord::Order),
    };
    let Some(locked) = locked else {
        drop(uow);
        let detail = format!("no {} {}", metadata.kind, metadata.domain_id);
        return flag_unroutable(delivery, &detail, ctx).await;
    };
    if locked.requester_id() != metadata.requester_id {
        drop(uow);
        let detail = format!("requester does not own {} {}", metadata.kind, metadata.domain_id);
        return flag_unroutable(delivery, &detail, ctx).await;
    }

    let session = match &delivery.session_id {
        Some(session_id) => uow.lock_checkout_session(session_id).await?,
        None => None,
    };
    if session
        .as_ref()
        .is_some_and(|s| s.kind != metadata.kind || s.domain_id != metadata.domain_id)
    {
        drop(uow);
        let detail = "session was issued for a different record";
        return flag_unroutable(delivery, detail, ctx).await;
    }

    match settlement {
        Settlement::Paid => apply_paid(uow, delivery, metadata, locked, session, now, ctx).await,
        Settlement::Failed => apply_failed(uow, delivery, metadata, locked, session, now).await,
    }
}

async fn apply_paid(
    mut uow: Box<dyn UnitOfWork>,
    delivery: &Delivery,
    metadata: SessionMetadata,
    locked: LockedRecord,
    session: Option<CheckoutSessionRecord>,
    now: DateTime<Utc>,
    ctx: ReconcileContext<'_>,
) -> Result<ReconcileOutcome, DomainError> {
    match transition::on_paid(locked.status()) {
        PaidStep::AlreadyPaid => {
            let reported = match (&delivery.session_id, &session) {
                (None, _) => ReportedSession::Unnamed,
                (Some(_), None) => ReportedSession::Unrecorded,
                (Some(_), Some(session)) => ReportedSession::Recorded(session.status),
            };
            let same_payment_id = match &locked {
                LockedRecord::Order(order) => {
                    delivery.payment_id.is_some()
                        && order.payment_confirmation_id == delivery.payment_id
                }
                LockedRecord::Booking(_) => false,
            };
            complete_session(uow.as_mut(), session.as_ref()).await?;

            match transition::on_paid_again(reported, same_payment_id) {
                RepeatStep::Replay => {
                    uow.commit().await?;
                    info!(domain_id = %metadata.domain_id, "record already paid");
                    Ok(ReconcileOutcome::Ignored(IgnoreReason::Duplicate))
                }
                RepeatStep::SecondCharge => {
                    let detail = format!(
                        "{} {} already paid, charged again through session {}",
                        metadata.kind,
                        metadata.domain_id,
                        delivery.session_id.as_deref().unwrap_or("?"),
                    );
                    uow.flag_payment_event(&flag_for(
                        delivery,
                        FlagReason::DuplicatePayment,
                        &detail,
                        now,
                    ))
                    .await?;
                    uow.commit().await?;
                    error!(operator_review = true, payment_id = ?delivery.payment_id, %detail, "paid record charged twice");
                    Ok(ReconcileOutcome::Rejected(RejectReason::DuplicatePayment))
                }
            }
        }
        PaidStep::Inconsistent => {
            let detail = format!("payment reported for cancelled {} {}", metadata.kind, metadata.domain_id);
            uow.flag_payment_event(&flag_for(delivery, FlagReason::Inconsistent, &detail, now))
                .await?;
            uow.commit().await?;
            error!(operator_review = true, %detail, "payment for a cancelled record");
            Ok(ReconcileOutcome::Rejected(RejectReason::Inconsistent))
        }
        PaidStep::MarkPaid => {
            match locked {
                LockedRecord::Booking(booking) => {
                    uow.set_booking_status(booking.id, RecordStatus::Paid, now)
                        .await?;
                }
                LockedRecord::Order(mut order) => {
                    if let Err(detail) = apply_order_effects(uow.as_mut(), &order, now, ctx).await?
                    {
                        drop(uow);
                        error!(operator_review = true, order_id = %order.id, %detail, "order effects rejected, payment not applied");
                        flag(delivery, FlagReason::LedgerConflict, &detail, ctx).await?;
                        return Ok(ReconcileOutcome::Rejected(RejectReason::LedgerConflict));
                    }
                    order.status = RecordStatus::Paid;
                    order.payment_confirmation_id.clone_from(&delivery.payment_id);
                    if delivery.session_id.is_some() {
                        order.external_session_id.clone_from(&delivery.session_id);
                    }
                    order.updated_at = now;
                    uow.update_order(&order).await?;
                }
            }
            complete_session(uow.as_mut(), session.as_ref()).await?;
            uow.commit().await?;
            info!(kind = %metadata.kind, domain_id = %metadata.domain_id, "record paid");
            Ok(ReconcileOutcome::Applied(Transition::MarkedPaid {
                kind: metadata.kind,
                domain_id: metadata.domain_id,
            }))
        }
    }
}

/// Applies the ledger effects of a paid order. `Ok(Err(detail))` means a
/// ledger refused; the caller must then discard the unit of work.
///
/// Stock rows are locked in `product_id` order, one movement per product, so
/// two orders sharing products cannot lock them in opposite orders.
async fn apply_order_effects(
    uow: &mut dyn UnitOfWork,
    order: &OrderRecord,
    now: DateTime<Utc>,
    ctx: ReconcileContext<'_>,
) -> Result<Result<(), String>, DomainError> {
    let system = Actor::system("reconciler");
    let lines = uow.order_lines(order.id).await?;

    for (product_id, quantity) in units_per_product(&lines) {
        let sale = AdjustStock {
            movement_id: Uuid::now_v7(),
            product_id,
            delta: -quantity,
            reason: "sale".into(),
        };
        if let AdjustOutcome::Rejected(rejection) = adjust_within(uow, &sale, &system, now).await? {
            return Ok(Err(format!("product {product_id}: {rejection:?}")));
        }
    }

    if let Some(voucher) = &order.voucher {
        let draft = RedemptionDraft {
            redemption_id: Uuid::now_v7(),
            code: &voucher.code,
            amount: voucher.amount,
            order_id: Some(order.id),
            actor: &system,
        };
        if let RedeemOutcome::Rejected(rejection) = redeem_within(uow, &draft, now).await? {
            return Ok(Err(format!("voucher {}: {rejection:?}", voucher.code)));
        }
    }

    for line in &lines {
        if let OrderLine::GiftVoucher { amount, recipient } = line {
            let draft = VoucherDraft {
                voucher_id: Uuid::now_v7(),
                amount: *amount,
                buyer_id: Some(order.requester_id),
                recipient: recipient.clone(),
                expires_at: Some(now + ctx.voucher_validity),
            };
            let voucher = issue_within(uow, draft, ctx.codes, now).await?;
            info!(order_id = %order.id, voucher_id = %voucher.id, "gift voucher issued");
        }
    }

    Ok(Ok(()))
}

fn units_per_product(lines: &[OrderLine]) -> BTreeMap<Uuid, i64> {
    let mut units = BTreeMap::new();
    for line in lines {
        if let OrderLine::Product {
            product_id,
            quantity,
            ..
        } = line
        {
            *units.entry(*product_id).or_insert(0) += i64::from(*quantity);
        }
    }
    units
}

async fn apply_failed(
    mut uow: Box<dyn UnitOfWork>,
    delivery: &Delivery,
    metadata: SessionMetadata,
    locked: LockedRecord,
    session: Option<CheckoutSessionRecord>,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, DomainError> {
    if let Some(session) = session.as_ref().filter(|s| s.status == SessionStatus::Open) {
        uow.set_checkout_session_status(&session.session_id, SessionStatus::Expired)
            .await?;
    }
    let other_open = uow
        .count_other_open_sessions(
            metadata.kind,
            metadata.domain_id,
            delivery.session_id.as_deref(),
        )
        .await?;

    let outcome = match transition::on_failed(locked.status(), other_open) {
        FailedStep::Cancel => {
            match locked {
                LockedRecord::Booking(booking) => {
                    uow.set_booking_status(booking.id, RecordStatus::Cancelled, now)
                        .await?;
                }
                LockedRecord::Order(mut order) => {
                    order.status = RecordStatus::Cancelled;
                    order.updated_at = now;
                    uow.update_order(&order).await?;
                }
            }
            info!(kind = %metadata.kind, domain_id = %metadata.domain_id, "record cancelled after failed payment");
            ReconcileOutcome::Applied(Transition::MarkedCancelled {
                kind: metadata.kind,
                domain_id: metadata.domain_id,
            })
        }
        FailedStep::CloseSession => {
            info!(other_open, "session failed, record still has open sessions");
            ReconcileOutcome::Applied(Transition::SessionClosed {
                session_id: delivery.session_id.clone(),
            })
        }
        FailedStep::AlreadySettled => ReconcileOutcome::Ignored(IgnoreReason::Duplicate),
    };
    uow.commit().await?;
    Ok(outcome)
}

async fn complete_session(
    uow: &mut dyn UnitOfWork,
    session: Option<&CheckoutSessionRecord>,
) -> Result<(), DomainError> {
    if let Some(session) = session.filter(|s| s.status != SessionStatus::Complete) {
        uow.set_checkout_session_status(&session.session_id, SessionStatus::Complete)
            .await?;
    }
    Ok(())
}

async fn flag_unroutable(
    delivery: &Delivery,
    detail: &str,
    ctx: ReconcileContext<'_>,
) -> Result<ReconcileOutcome, DomainError> {
    warn!(operator_review = true, key = %delivery.key, detail, "unroutable payment notification");
    flag(delivery, FlagReason::Unroutable, detail, ctx).await?;
    Ok(ReconcileOutcome::Ignored(IgnoreReason::Unroutable))
}

/// Parks a delivery for review in a unit of its own.
async fn flag(
    delivery: &Delivery,
    reason: FlagReason,
    detail: &str,
    ctx: ReconcileContext<'_>,
) -> Result<(), DomainError> {
    let mut uow = ctx.store.begin().await?;
    uow.flag_payment_event(&flag_for(delivery, reason, detail, ctx.clock.now()))
        .await?;
    uow.commit().await
}

fn flag_for(
    delivery: &Delivery,
    reason: FlagReason,
    detail: &str,
    now: DateTime<Utc>,
) -> FlaggedPaymentEvent {
    FlaggedPaymentEvent {
        external_event_id: delivery.key.clone(),
        reason,
        detail: detail.to_owned(),
        payload: delivery.payload.clone(),
        flagged_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(product_id: Uuid, quantity: i32) -> OrderLine {
        OrderLine::Product {
            product_id,
            quantity,
            unit_price: 500,
        }
    }

    #[test]
    fn test_units_per_product_sums_repeated_products_in_id_order() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let lines = vec![
            product(high, 1),
            OrderLine::GiftVoucher {
                amount: 1_000,
                recipient: None,
            },
            product(low, 2),
            product(high, 3),
        ];

        let units: Vec<(Uuid, i64)> = units_per_product(&lines).into_iter().collect();

        assert_eq!(units, vec![(low, 2), (high, 4)]);
    }
}
