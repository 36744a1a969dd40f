//! Helpers for route tests backed by the in-memory store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use marginalia_core::store::CommerceStore;
use marginalia_payments::domain::signature::WebhookVerifier;
use marginalia_test_support::{
    FixedClock, InMemoryCommerceStore, RecordingPaymentGateway, SequenceCodeGenerator, fixed_now,
};
use serde_json::Value;
use tower::ServiceExt;

use crate::auth::StaffTokens;
use crate::state::AppState;

pub(crate) const ADMIN_TOKEN: &str = "admin-token";
pub(crate) const POS_TOKEN: &str = "till-token";
pub(crate) const WEBHOOK_SECRET: &str = "whsec_test";

pub(crate) struct TestApp {
    pub store: InMemoryCommerceStore,
    pub gateway: Arc<RecordingPaymentGateway>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let store = InMemoryCommerceStore::new();
        let gateway = Arc::new(RecordingPaymentGateway::new());
        let state = state_with(Arc::new(store.clone()), gateway.clone());
        Self {
            store,
            gateway,
            state,
        }
    }
}

pub(crate) fn state_with(
    store: Arc<dyn CommerceStore>,
    gateway: Arc<RecordingPaymentGateway>,
) -> AppState {
    AppState {
        store,
        gateway,
        clock: Arc::new(FixedClock(fixed_now())),
        codes: Arc::new(SequenceCodeGenerator::new(&[
            "GIFT-ROUT-0001",
            "GIFT-ROUT-0002",
        ])),
        verifier: WebhookVerifier::new(WEBHOOK_SECRET, chrono::Duration::seconds(300)),
        staff_tokens: StaffTokens {
            admin: ADMIN_TOKEN.into(),
            point_of_sale: Some(POS_TOKEN.into()),
        },
        currency: "gbp".into(),
        voucher_validity: chrono::Duration::days(365),
    }
}

/// Sends a request with an optional bearer token and JSON body.
pub(crate) async fn send(
    app: Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<&Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
    (status, json)
}
