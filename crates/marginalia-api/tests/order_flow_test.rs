mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use common::{
    ADMIN_TOKEN, POS_TOKEN, TestApp, build_test_app, get_json, get_json_as, post_json,
    post_json_as,
};

async fn stock(app: &TestApp, product_id: Uuid, delta: i64) {
    let (status, json) = post_json_as(
        &app.router,
        "/api/v1/inventory/adjust",
        Some(ADMIN_TOKEN),
        &json!({
            "movement_id": Uuid::new_v4(),
            "product_id": product_id,
            "delta": delta,
            "reason": "delivery",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
}

async fn issue_voucher(app: &TestApp, amount: i64) -> String {
    let (status, json) = post_json_as(
        &app.router,
        "/api/v1/vouchers",
        Some(ADMIN_TOKEN),
        &json!({ "amount": amount, "recipient": "Sam" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["code"].as_str().unwrap().to_owned()
}

async fn pay(app: &TestApp, order_id: &str, amount: i64) -> Value {
    let (status, issued) = post_json(
        &app.router,
        "/api/v1/checkout",
        &json!({
            "kind": "order",
            "domain_id": order_id,
            "amount": amount,
            "description": "Marginalia order",
            "contact_email": "reader@example.test",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{issued}");
    let session_id = issued["session_id"].as_str().unwrap().to_owned();
    app.gateway.mark_paid(&session_id, "pi_order");

    let (status, confirmed) = post_json(
        &app.router,
        "/api/v1/payments/confirm",
        &json!({ "session_id": session_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{confirmed}");
    confirmed
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_paid_order_moves_stock_and_vouchers(pool: sqlx::PgPool) {
    // Arrange
    let app = build_test_app(pool);
    let product_id = Uuid::new_v4();
    stock(&app, product_id, 5).await;
    let code = issue_voucher(&app, 1_000).await;

    // Act
    let (status, placed) = post_json(
        &app.router,
        "/api/v1/orders",
        &json!({
            "request_id": Uuid::new_v4(),
            "requester_id": Uuid::new_v4(),
            "lines": [
                { "type": "product", "product_id": product_id, "quantity": 2, "unit_price": 800 },
                { "type": "gift_voucher", "amount": 2_000, "recipient": "Alex" },
            ],
            "voucher": { "code": code, "amount": 1_000 },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{placed}");
    assert_eq!(placed["amount_due"], 2_600);
    let order_id = placed["order_id"].as_str().unwrap().to_owned();

    let confirmed = pay(&app, &order_id, 2_600).await;

    // Assert
    assert_eq!(confirmed["outcome"], "applied");
    assert_eq!(confirmed["transition"], "marked_paid");

    let (_, order) = get_json(&app.router, &format!("/api/v1/orders/{order_id}")).await;
    assert_eq!(order["status"], "paid");
    assert_eq!(order["payment_confirmation_id"], "pi_order");

    let (_, balance) = get_json(&app.router, &format!("/api/v1/inventory/{product_id}")).await;
    assert_eq!(balance["balance"], 3);

    let (_, spent) =
        get_json_as(&app.router, &format!("/api/v1/vouchers/{code}"), Some(POS_TOKEN)).await;
    assert_eq!(spent["amount_remaining"], 0);
    assert_eq!(spent["status"], "redeemed");

    let (status, gift) =
        get_json_as(&app.router, "/api/v1/vouchers/GIFT-INTG-0002", Some(POS_TOKEN)).await;
    assert_eq!(status, StatusCode::OK, "{gift}");
    assert_eq!(gift["amount_initial"], 2_000);
    assert_eq!(gift["recipient"], "Alex");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_confirm_before_capture_leaves_order_pending(pool: sqlx::PgPool) {
    let app = build_test_app(pool);
    let (_, placed) = post_json(
        &app.router,
        "/api/v1/orders",
        &json!({
            "request_id": Uuid::new_v4(),
            "requester_id": Uuid::new_v4(),
            "lines": [{ "type": "gift_voucher", "amount": 1_500, "recipient": null }],
        }),
    )
    .await;
    let order_id = placed["order_id"].as_str().unwrap().to_owned();
    let (status, _) = post_json(
        &app.router,
        "/api/v1/checkout",
        &json!({
            "kind": "order",
            "domain_id": order_id,
            "amount": 1_500,
            "description": "Gift voucher",
            "contact_email": "reader@example.test",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, confirmed) = post_json(
        &app.router,
        "/api/v1/payments/confirm",
        &json!({ "kind": "order", "domain_id": order_id }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["outcome"], "ignored");
    assert_eq!(confirmed["reason"], "awaiting_payment");
    let (_, order) = get_json(&app.router, &format!("/api/v1/orders/{order_id}")).await;
    assert_eq!(order["status"], "pending");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_checkout_amount_must_match_amount_due(pool: sqlx::PgPool) {
    let app = build_test_app(pool);
    let (_, placed) = post_json(
        &app.router,
        "/api/v1/orders",
        &json!({
            "request_id": Uuid::new_v4(),
            "requester_id": Uuid::new_v4(),
            "lines": [{ "type": "gift_voucher", "amount": 1_500, "recipient": null }],
        }),
    )
    .await;
    let order_id = placed["order_id"].as_str().unwrap().to_owned();

    let (status, json) = post_json(
        &app.router,
        "/api/v1/checkout",
        &json!({
            "kind": "order",
            "domain_id": order_id,
            "amount": 1_000,
            "description": "Gift voucher",
            "contact_email": "reader@example.test",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["outcome"], "refused");
    assert!(app.gateway.created_sessions().is_empty());
}
