//! Shared fixture for reconciliation tests.

#![allow(dead_code)]

use chrono::Duration;
use marginalia_core::gateway::{CreateSessionRequest, PaymentGateway, SessionMetadata};
use marginalia_core::model::{
    BookingRecord, CheckoutSessionRecord, DomainKind, EventRecord, OrderLine, OrderRecord,
    RecordStatus, SessionStatus, VoucherApplication,
};
use marginalia_payments::application::command_handlers::ReconcileContext;
use marginalia_payments::domain::signature::WebhookVerifier;
use marginalia_test_support::{
    FixedClock, InMemoryCommerceStore, RecordingPaymentGateway, SequenceCodeGenerator, fixed_now,
    sign_webhook,
};
use serde_json::json;
use uuid::Uuid;

pub const SECRET: &str = "whsec_test";

pub struct Fixture {
    pub store: InMemoryCommerceStore,
    pub gateway: RecordingPaymentGateway,
    pub codes: SequenceCodeGenerator,
    pub clock: FixedClock,
    pub verifier: WebhookVerifier,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            store: InMemoryCommerceStore::new(),
            gateway: RecordingPaymentGateway::new(),
            codes: SequenceCodeGenerator::new(&["GIFT-NEWW-0001", "GIFT-NEWW-0002"]),
            clock: FixedClock(fixed_now()),
            verifier: WebhookVerifier::new(SECRET, Duration::seconds(300)),
        }
    }

    pub fn ctx(&self) -> ReconcileContext<'_> {
        ReconcileContext {
            clock: &self.clock,
            codes: &self.codes,
            store: &self.store,
            voucher_validity: Duration::days(365),
        }
    }

    /// Seeds a booking of the given status and returns its metadata.
    pub async fn booking(&self, status: RecordStatus) -> SessionMetadata {
        let event_id = Uuid::new_v4();
        let metadata = SessionMetadata {
            kind: DomainKind::Booking,
            domain_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
        };
        self.store
            .seed(|state| {
                state.events.insert(
                    event_id,
                    EventRecord {
                        id: event_id,
                        title: "Author talk".into(),
                        capacity: 10,
                        unit_price: 1_000,
                        created_at: fixed_now(),
                    },
                );
                state.bookings.push(BookingRecord {
                    id: metadata.domain_id,
                    event_id,
                    requester_id: metadata.requester_id,
                    status,
                    request_id: Uuid::new_v4(),
                    created_at: fixed_now(),
                    updated_at: fixed_now(),
                });
            })
            .await;
        metadata
    }

    /// Seeds a pending order and returns its metadata.
    pub async fn order(
        &self,
        lines: Vec<OrderLine>,
        voucher: Option<VoucherApplication>,
    ) -> SessionMetadata {
        let metadata = SessionMetadata {
            kind: DomainKind::Order,
            domain_id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
        };
        let total: i64 = lines.iter().map(OrderLine::total).sum();
        self.store
            .seed(|state| {
                state.orders.insert(
                    metadata.domain_id,
                    (
                        OrderRecord {
                            id: metadata.domain_id,
                            requester_id: metadata.requester_id,
                            status: RecordStatus::Pending,
                            total,
                            voucher,
                            request_id: Uuid::new_v4(),
                            external_session_id: None,
                            payment_confirmation_id: None,
                            created_at: fixed_now(),
                            updated_at: fixed_now(),
                        },
                        lines,
                    ),
                );
            })
            .await;
        metadata
    }

    /// Creates a provider session for the record and records it as open.
    pub async fn open_session(&self, metadata: SessionMetadata) -> String {
        let handle = self
            .gateway
            .create_session(&CreateSessionRequest {
                amount: 1_000,
                currency: "gbp".into(),
                description: "test".into(),
                contact_email: "reader@example.com".into(),
                metadata,
            })
            .await
            .unwrap();
        let session_id = handle.session_id.clone();
        self.store
            .seed(|state| {
                state.sessions.push(CheckoutSessionRecord {
                    session_id: handle.session_id,
                    kind: metadata.kind,
                    domain_id: metadata.domain_id,
                    requester_id: metadata.requester_id,
                    amount: 1_000,
                    status: SessionStatus::Open,
                    created_at: fixed_now(),
                });
            })
            .await;
        session_id
    }
}

/// Builds a notification body.
pub fn notification(
    id: &str,
    event_type: &str,
    session_id: &str,
    metadata: &SessionMetadata,
) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": id,
        "type": event_type,
        "data": {
            "session_id": session_id,
            "payment_id": format!("pi_{id}"),
            "metadata": metadata.to_map(),
        }
    }))
    .unwrap()
}

/// Signs a body as the provider would, at the fixture's current time.
pub fn sign(body: &[u8]) -> String {
    sign_webhook(SECRET, fixed_now().timestamp(), body)
}
