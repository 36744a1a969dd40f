//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use marginalia_api::auth::StaffTokens;
use marginalia_api::state::AppState;
use marginalia_payments::domain::signature::WebhookVerifier;
use marginalia_store::pg_commerce_store::PgCommerceStore;
use marginalia_test_support::{
    FixedClock, RecordingPaymentGateway, SequenceCodeGenerator, fixed_now, sign_webhook,
};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const POS_TOKEN: &str = "till-token";
pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// The full router over a real `PgCommerceStore`, plus the fake provider it
/// talks to.
pub struct TestApp {
    pub router: Router,
    pub gateway: Arc<RecordingPaymentGateway>,
}

/// Build the full app router with a real `PgCommerceStore`, a fixed clock and
/// a recording payment gateway. Uses the same router as `main.rs`.
pub fn build_test_app(pool: PgPool) -> TestApp {
    let gateway = Arc::new(RecordingPaymentGateway::new());
    let app_state = AppState {
        store: Arc::new(PgCommerceStore::new(pool)),
        gateway: gateway.clone(),
        clock: Arc::new(FixedClock(fixed_now())),
        codes: Arc::new(SequenceCodeGenerator::new(&["GIFT-INTG-0001", "GIFT-INTG-0002"])),
        verifier: WebhookVerifier::new(WEBHOOK_SECRET, chrono::Duration::seconds(300)),
        staff_tokens: StaffTokens {
            admin: ADMIN_TOKEN.into(),
            point_of_sale: Some(POS_TOKEN.into()),
        },
        currency: "gbp".into(),
        voucher_validity: chrono::Duration::days(365),
    };

    TestApp {
        router: marginalia_api::app(app_state),
        gateway,
    }
}

async fn read(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(router: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    post_json_as(router, uri, None, body).await
}

/// Send a POST request with a JSON body and an optional staff token.
pub async fn post_json_as(
    router: &Router,
    uri: &str,
    token: Option<&str>,
    body: &Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    read(router, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    get_json_as(router, uri, None).await
}

/// Send a GET request with an optional staff token.
pub async fn get_json_as(router: &Router, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    read(router, builder.body(Body::empty()).unwrap()).await
}

/// Deliver a signed `payment_succeeded` notification for `session_id`.
pub async fn deliver_payment_succeeded(
    router: &Router,
    event_id: &str,
    session_id: &str,
    metadata: &Value,
) -> (StatusCode, Value) {
    let body = serde_json::to_vec(&serde_json::json!({
        "id": event_id,
        "type": "payment_succeeded",
        "data": {
            "session_id": session_id,
            "payment_id": format!("pi_{event_id}"),
            "metadata": metadata,
        }
    }))
    .unwrap();
    let signature = sign_webhook(WEBHOOK_SECRET, fixed_now().timestamp(), &body);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/payments/webhook")
        .header("content-type", "application/json")
        .header("payment-signature", signature)
        .body(Body::from(body))
        .unwrap();

    read(router, request).await
}
