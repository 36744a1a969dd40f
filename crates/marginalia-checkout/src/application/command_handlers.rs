//! Command handlers for the Checkout context.

use marginalia_core::clock::Clock;
use marginalia_core::command::Command;
use marginalia_core::error::DomainError;
use marginalia_core::gateway::{CreateSessionRequest, PaymentGateway, SessionMetadata};
use marginalia_core::model::{
    CheckoutSessionRecord, DomainKind, OrderRecord, RecordStatus, SessionStatus,
};
use marginalia_core::store::CommerceStore;
use marginalia_vouchers::domain::ledger::{self, RedeemRejection};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::payable;
use crate::domain::commands::{IssueCheckout, PlaceOrder};
use crate::domain::issuance::{self, IssueOutcome, IssueRefusal};
use crate::domain::orders::{self, PlaceOrderOutcome};

/// Handles the `PlaceOrder` command.
///
/// A voucher application is checked against the voucher's current balance
/// so an obviously unusable code is refused up front. The balance is not
/// reserved: the redemption itself happens when the order is paid.
///
/// # Errors
///
/// Returns `DomainError::Validation` for malformed lines or voucher, or a
/// request id already used by another customer.
#[instrument(skip_all, fields(request_id = %command.request_id))]
pub async fn handle_place_order(
    command: &PlaceOrder,
    clock: &dyn Clock,
    store: &dyn CommerceStore,
) -> Result<PlaceOrderOutcome, DomainError> {
    let total = orders::order_total(&command.lines)?;
    let voucher = orders::normalize_voucher(command.voucher.as_ref(), total)?;

    let mut uow = store.begin().await?;
    if let Some(existing) = uow.find_order_by_request(command.request_id).await? {
        return replay_order(&existing, command);
    }

    let now = clock.now();
    if let Some(applied) = &voucher {
        let rejection = match uow.find_voucher_by_code(&applied.code).await? {
            None => Some(RedeemRejection::NotFound),
            Some(stored) => ledger::check_redeemable(&stored, applied.amount, now).err(),
        };
        if let Some(rejection) = rejection {
            info!(code = %applied.code, ?rejection, "order refused, voucher unusable");
            return Ok(PlaceOrderOutcome::VoucherRejected(rejection));
        }
    }

    let order = OrderRecord {
        id: Uuid::now_v7(),
        requester_id: command.requester_id,
        status: RecordStatus::Pending,
        total,
        voucher,
        request_id: command.request_id,
        external_session_id: None,
        payment_confirmation_id: None,
        created_at: now,
        updated_at: now,
    };
    match uow.insert_order(&order, &command.lines).await {
        Ok(()) => uow.commit().await?,
        // A concurrent placement with the same request id committed first.
        Err(DomainError::Conflict(_)) => {
            drop(uow);
            let mut uow = store.begin().await?;
            let existing = uow
                .find_order_by_request(command.request_id)
                .await?
                .ok_or_else(|| {
                    DomainError::Conflict(format!(
                        "order for request {} already exists",
                        command.request_id
                    ))
                })?;
            return replay_order(&existing, command);
        }
        Err(err) => return Err(err),
    }

    info!(
        command = command.command_type(),
        order_id = %order.id,
        total,
        amount_due = order.amount_due(),
        "order placed"
    );
    Ok(PlaceOrderOutcome::Placed {
        order_id: order.id,
        amount_due: order.amount_due(),
        replayed: false,
    })
}

fn replay_order(
    existing: &OrderRecord,
    command: &PlaceOrder,
) -> Result<PlaceOrderOutcome, DomainError> {
    if existing.requester_id != command.requester_id {
        return Err(DomainError::Validation(format!(
            "request id {} was already used by another customer",
            command.request_id
        )));
    }
    Ok(PlaceOrderOutcome::Placed {
        order_id: existing.id,
        amount_due: existing.amount_due(),
        replayed: true,
    })
}

/// Handles the `IssueCheckout` command.
///
/// The record is checked, the provider session is created outside any
/// transaction, and the session is then recorded under the record's row
/// lock. If the record stopped being pending in between, the new session is
/// left unrecorded and the issue is refused; a payment made through it finds
/// the record settled and is flagged for review.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a malformed request and
/// `DomainError::Infrastructure` if the store or the provider fails.
#[instrument(skip_all, fields(kind = %command.kind, domain_id = %command.domain_id))]
pub async fn handle_issue_checkout(
    command: &IssueCheckout,
    clock: &dyn Clock,
    gateway: &dyn PaymentGateway,
    store: &dyn CommerceStore,
) -> Result<IssueOutcome, DomainError> {
    issuance::validate_request(command.amount, &command.currency, &command.contact_email)?;

    let requester_id = {
        let mut uow = store.begin().await?;
        let Some(record) = payable::load(uow.as_mut(), command.kind, command.domain_id, false).await?
        else {
            return Ok(IssueOutcome::Refused(IssueRefusal::NotFound));
        };
        if let Err(refusal) =
            issuance::check_issuable(record.status, record.amount_due, command.amount)
        {
            info!(?refusal, "checkout refused");
            return Ok(IssueOutcome::Refused(refusal));
        }
        record.requester_id
    };

    let handle = gateway
        .create_session(&CreateSessionRequest {
            amount: command.amount,
            currency: command.currency.trim().to_ascii_lowercase(),
            description: command.description.clone(),
            contact_email: command.contact_email.clone(),
            metadata: SessionMetadata {
                kind: command.kind,
                domain_id: command.domain_id,
                requester_id,
            },
        })
        .await?;

    let mut uow = store.begin().await?;
    let status = payable::load(uow.as_mut(), command.kind, command.domain_id, true)
        .await?
        .map_or(RecordStatus::Cancelled, |record| record.status);
    if status != RecordStatus::Pending {
        warn!(
            session_id = %handle.session_id,
            %status,
            "record settled while its session was being created"
        );
        return Ok(IssueOutcome::Refused(IssueRefusal::NotPending { status }));
    }

    let now = clock.now();
    uow.insert_checkout_session(&CheckoutSessionRecord {
        session_id: handle.session_id.clone(),
        kind: command.kind,
        domain_id: command.domain_id,
        requester_id,
        amount: command.amount,
        status: SessionStatus::Open,
        created_at: now,
    })
    .await?;
    if command.kind == DomainKind::Order {
        if let Some(mut order) = uow.lock_order(command.domain_id).await? {
            order.external_session_id = Some(handle.session_id.clone());
            order.updated_at = now;
            uow.update_order(&order).await?;
        }
    }
    uow.commit().await?;

    info!(session_id = %handle.session_id, amount = command.amount, "checkout session issued");
    Ok(IssueOutcome::Issued(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use marginalia_core::model::{
        BookingRecord, EventRecord, OrderLine, VoucherApplication, VoucherRecord, VoucherStatus,
    };
    use marginalia_test_support::{
        FailingPaymentGateway, FixedClock, InMemoryCommerceStore, RecordingPaymentGateway,
        fixed_now,
    };

    fn book_line() -> OrderLine {
        OrderLine::Product {
            product_id: Uuid::new_v4(),
            quantity: 2,
            unit_price: 1_500,
        }
    }

    fn place(voucher: Option<VoucherApplication>) -> PlaceOrder {
        PlaceOrder {
            request_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            lines: vec![book_line()],
            voucher,
        }
    }

    async fn seed_voucher(store: &InMemoryCommerceStore, remaining: i64) {
        store
            .seed(|state| {
                state.vouchers.push(VoucherRecord {
                    id: Uuid::new_v4(),
                    code: "GIFT-AAAA-0001".into(),
                    amount_initial: 5_000,
                    amount_remaining: remaining,
                    status: VoucherStatus::Active,
                    buyer_id: None,
                    recipient: None,
                    expires_at: Some(fixed_now() + Duration::days(30)),
                    issued_at: fixed_now(),
                });
            })
            .await;
    }

    async fn seed_booking(store: &InMemoryCommerceStore, status: RecordStatus) -> Uuid {
        let event_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();
        store
            .seed(|state| {
                state.events.insert(
                    event_id,
                    EventRecord {
                        id: event_id,
                        title: "Poetry evening".into(),
                        capacity: 20,
                        unit_price: 800,
                        created_at: fixed_now(),
                    },
                );
                state.bookings.push(BookingRecord {
                    id: booking_id,
                    event_id,
                    requester_id: Uuid::new_v4(),
                    status,
                    request_id: Uuid::new_v4(),
                    created_at: fixed_now(),
                    updated_at: fixed_now(),
                });
            })
            .await;
        booking_id
    }

    fn issue_booking(booking_id: Uuid, amount: i64) -> IssueCheckout {
        IssueCheckout {
            kind: DomainKind::Booking,
            domain_id: booking_id,
            amount,
            currency: "GBP".into(),
            description: "Poetry evening".into(),
            contact_email: "reader@example.com".into(),
        }
    }

    #[tokio::test]
    async fn test_place_order_computes_amount_due() {
        // Arrange
        let store = InMemoryCommerceStore::new();
        seed_voucher(&store, 5_000).await;
        let command = place(Some(VoucherApplication {
            code: "gift-aaaa-0001".into(),
            amount: 1_000,
        }));

        // Act
        let outcome = handle_place_order(&command, &FixedClock(fixed_now()), &store)
            .await
            .unwrap();

        // Assert
        let PlaceOrderOutcome::Placed {
            order_id,
            amount_due,
            replayed,
        } = outcome
        else {
            panic!("expected Placed, got {outcome:?}");
        };
        assert_eq!(amount_due, 2_000);
        assert!(!replayed);
        let state = store.snapshot().await;
        let (order, lines) = &state.orders[&order_id];
        assert_eq!(order.total, 3_000);
        assert_eq!(order.voucher.as_ref().unwrap().code, "GIFT-AAAA-0001");
        assert_eq!(lines.len(), 1);
        // Placement does not touch the voucher.
        assert_eq!(state.vouchers[0].amount_remaining, 5_000);
    }

    #[tokio::test]
    async fn test_place_order_replay_returns_same_order() {
        let store = InMemoryCommerceStore::new();
        let command = place(None);
        let clock = FixedClock(fixed_now());

        let first = handle_place_order(&command, &clock, &store).await.unwrap();
        let second = handle_place_order(&command, &clock, &store).await.unwrap();

        let (PlaceOrderOutcome::Placed { order_id: a, .. }, PlaceOrderOutcome::Placed { order_id: b, replayed, .. }) =
            (first, second)
        else {
            panic!("expected two placements");
        };
        assert_eq!(a, b);
        assert!(replayed);
        assert_eq!(store.snapshot().await.orders.len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_rejects_request_id_reused_by_another_customer() {
        let store = InMemoryCommerceStore::new();
        let command = place(None);
        let clock = FixedClock(fixed_now());
        handle_place_order(&command, &clock, &store).await.unwrap();

        let result = handle_place_order(
            &PlaceOrder {
                requester_id: Uuid::new_v4(),
                ..command
            },
            &clock,
            &store,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(store.snapshot().await.orders.len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_refuses_short_voucher() {
        let store = InMemoryCommerceStore::new();
        seed_voucher(&store, 400).await;

        let outcome = handle_place_order(
            &place(Some(VoucherApplication {
                code: "GIFT-AAAA-0001".into(),
                amount: 1_000,
            })),
            &FixedClock(fixed_now()),
            &store,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            PlaceOrderOutcome::VoucherRejected(RedeemRejection::InsufficientBalance {
                remaining: 400
            })
        );
        assert!(store.snapshot().await.orders.is_empty());
    }

    #[tokio::test]
    async fn test_place_order_refuses_unknown_voucher() {
        let store = InMemoryCommerceStore::new();

        let outcome = handle_place_order(
            &place(Some(VoucherApplication {
                code: "GIFT-NONE-0000".into(),
                amount: 100,
            })),
            &FixedClock(fixed_now()),
            &store,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            PlaceOrderOutcome::VoucherRejected(RedeemRejection::NotFound)
        );
    }

    #[tokio::test]
    async fn test_issue_for_pending_booking_embeds_metadata() {
        // Arrange
        let store = InMemoryCommerceStore::new();
        let gateway = RecordingPaymentGateway::new();
        let booking_id = seed_booking(&store, RecordStatus::Pending).await;

        // Act
        let outcome = handle_issue_checkout(
            &issue_booking(booking_id, 800),
            &FixedClock(fixed_now()),
            &gateway,
            &store,
        )
        .await
        .unwrap();

        // Assert
        let IssueOutcome::Issued(handle) = outcome else {
            panic!("expected Issued, got {outcome:?}");
        };
        assert_eq!(handle.session_id, "cs_test_1");
        let created = gateway.created_sessions();
        assert_eq!(created[0].metadata.kind, DomainKind::Booking);
        assert_eq!(created[0].metadata.domain_id, booking_id);
        assert_eq!(created[0].currency, "gbp");
        let state = store.snapshot().await;
        assert_eq!(state.sessions.len(), 1);
        assert_eq!(state.sessions[0].status, SessionStatus::Open);
    }

    #[tokio::test]
    async fn test_issue_twice_records_both_sessions() {
        let store = InMemoryCommerceStore::new();
        let gateway = RecordingPaymentGateway::new();
        let booking_id = seed_booking(&store, RecordStatus::Pending).await;
        let clock = FixedClock(fixed_now());

        for _ in 0..2 {
            handle_issue_checkout(&issue_booking(booking_id, 800), &clock, &gateway, &store)
                .await
                .unwrap();
        }

        assert_eq!(store.snapshot().await.sessions.len(), 2);
    }

    #[tokio::test]
    async fn test_issue_for_paid_booking_is_refused() {
        let store = InMemoryCommerceStore::new();
        let gateway = RecordingPaymentGateway::new();
        let booking_id = seed_booking(&store, RecordStatus::Paid).await;

        let outcome = handle_issue_checkout(
            &issue_booking(booking_id, 800),
            &FixedClock(fixed_now()),
            &gateway,
            &store,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            IssueOutcome::Refused(IssueRefusal::NotPending {
                status: RecordStatus::Paid
            })
        );
        assert!(gateway.created_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_issue_with_wrong_amount_is_refused() {
        let store = InMemoryCommerceStore::new();
        let booking_id = seed_booking(&store, RecordStatus::Pending).await;

        let outcome = handle_issue_checkout(
            &issue_booking(booking_id, 100),
            &FixedClock(fixed_now()),
            &RecordingPaymentGateway::new(),
            &store,
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            IssueOutcome::Refused(IssueRefusal::AmountMismatch {
                expected: 800,
                actual: 100
            })
        );
    }

    #[tokio::test]
    async fn test_issue_for_unknown_record_is_refused() {
        let outcome = handle_issue_checkout(
            &issue_booking(Uuid::new_v4(), 800),
            &FixedClock(fixed_now()),
            &RecordingPaymentGateway::new(),
            &InMemoryCommerceStore::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, IssueOutcome::Refused(IssueRefusal::NotFound));
    }

    #[tokio::test]
    async fn test_provider_failure_records_nothing() {
        let store = InMemoryCommerceStore::new();
        let booking_id = seed_booking(&store, RecordStatus::Pending).await;

        let result = handle_issue_checkout(
            &issue_booking(booking_id, 800),
            &FixedClock(fixed_now()),
            &FailingPaymentGateway,
            &store,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert!(store.snapshot().await.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_issue_for_order_sets_external_session_id() {
        // Arrange
        let store = InMemoryCommerceStore::new();
        let gateway = RecordingPaymentGateway::new();
        let clock = FixedClock(fixed_now());
        let PlaceOrderOutcome::Placed { order_id, amount_due, .. } =
            handle_place_order(&place(None), &clock, &store).await.unwrap()
        else {
            panic!("expected Placed");
        };

        // Act
        handle_issue_checkout(
            &IssueCheckout {
                kind: DomainKind::Order,
                domain_id: order_id,
                amount: amount_due,
                currency: "gbp".into(),
                description: "Order".into(),
                contact_email: "reader@example.com".into(),
            },
            &clock,
            &gateway,
            &store,
        )
        .await
        .unwrap();

        // Assert
        let state = store.snapshot().await;
        assert_eq!(
            state.orders[&order_id].0.external_session_id.as_deref(),
            Some("cs_test_1")
        );
    }
}
