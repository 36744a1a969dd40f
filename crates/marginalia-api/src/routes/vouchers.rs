//! Routes for gift vouchers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use marginalia_core::model::{MinorUnits, VoucherRecord};
use marginalia_vouchers::application::{command_handlers, query_handlers};
use marginalia_vouchers::domain::commands;
use marginalia_vouchers::domain::ledger::{RedeemOutcome, RedeemRejection};

use crate::auth::StaffActor;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct IssueVoucherRequest {
    /// Caller-chosen id; repeating it returns the same voucher.
    pub voucher_id: Option<Uuid>,
    /// Stored value in minor units.
    pub amount: MinorUnits,
    /// Customer who paid for it, if known.
    pub buyer_id: Option<Uuid>,
    /// Who it is for.
    pub recipient: Option<String>,
    /// Expiry; defaults to the configured validity from now.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for POST /redeem.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// Idempotency key chosen by the till.
    pub redemption_id: Uuid,
    /// Voucher code as typed.
    pub code: String,
    /// Amount to take off.
    pub amount: MinorUnits,
}

/// Response body for POST /redeem.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RedeemResponse {
    /// The amount was taken off.
    Applied {
        /// Balance left.
        remaining: MinorUnits,
        /// `true` when this redemption id had already been applied.
        replayed: bool,
    },
    /// Nothing was taken.
    Rejected {
        /// Why not.
        #[serde(flatten)]
        rejection: RedeemRejection,
    },
}

/// Response body for POST /expire.
#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    /// Vouchers switched to expired.
    pub expired: u64,
}

/// POST /
#[instrument(skip_all, fields(actor = %actor.id))]
async fn issue_voucher(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
    Json(request): Json<IssueVoucherRequest>,
) -> Result<(StatusCode, Json<VoucherRecord>), ApiError> {
    let command = commands::IssueVoucher {
        voucher_id: request.voucher_id.unwrap_or_else(Uuid::now_v7),
        amount: request.amount,
        buyer_id: request.buyer_id,
        recipient: request.recipient,
        expires_at: Some(
            request
                .expires_at
                .unwrap_or_else(|| state.clock.now() + state.voucher_validity),
        ),
    };

    let voucher = command_handlers::handle_issue_voucher(
        &command,
        &actor,
        state.clock.as_ref(),
        state.codes.as_ref(),
        state.store.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(voucher)))
}

/// POST /redeem
#[instrument(skip_all, fields(redemption_id = %request.redemption_id, actor = %actor.id))]
async fn redeem_voucher(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
    Json(request): Json<RedeemRequest>,
) -> Result<(StatusCode, Json<RedeemResponse>), ApiError> {
    let command = commands::RedeemVoucher {
        redemption_id: request.redemption_id,
        code: request.code,
        amount: request.amount,
    };

    let outcome = command_handlers::handle_redeem_voucher(
        &command,
        &actor,
        state.clock.as_ref(),
        state.store.as_ref(),
    )
    .await?;

    let (status, body) = match outcome {
        RedeemOutcome::Applied {
            remaining,
            replayed,
        } => (
            StatusCode::OK,
            RedeemResponse::Applied {
                remaining,
                replayed,
            },
        ),
        RedeemOutcome::Rejected(rejection) => {
            let status = match rejection {
                RedeemRejection::NotFound => StatusCode::NOT_FOUND,
                RedeemRejection::Expired | RedeemRejection::InsufficientBalance { .. } => {
                    StatusCode::CONFLICT
                }
            };
            (status, RedeemResponse::Rejected { rejection })
        }
    };

    Ok((status, Json(body)))
}

/// GET /{code}
async fn get_voucher(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
    Path(code): Path<String>,
) -> Result<Json<query_handlers::VoucherView>, ApiError> {
    let view =
        query_handlers::get_voucher(&code, &actor, state.clock.now(), state.store.as_ref()).await?;
    Ok(Json(view))
}

/// POST /expire
#[instrument(skip_all, fields(actor = %actor.id))]
async fn expire_vouchers(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
) -> Result<Json<ExpireResponse>, ApiError> {
    let expired = command_handlers::handle_expire_vouchers(
        &actor,
        state.clock.as_ref(),
        state.store.as_ref(),
    )
    .await?;
    Ok(Json(ExpireResponse { expired }))
}

/// Returns the router for vouchers.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(issue_voucher))
        .route("/redeem", post(redeem_voucher))
        .route("/expire", post(expire_vouchers))
        .route("/{code}", get(get_voucher))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{ADMIN_TOKEN, POS_TOKEN, TestApp, send};
    use marginalia_core::model::VoucherStatus;
    use marginalia_test_support::fixed_now;
    use serde_json::json;

    async fn issue(app: &TestApp, amount: i64) -> serde_json::Value {
        let (status, json) = send(
            router().with_state(app.state.clone()),
            "POST",
            "/",
            Some(POS_TOKEN),
            Some(&json!({ "amount": amount, "recipient": "Ada" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json
    }

    fn redeem_body(code: &str, amount: i64) -> serde_json::Value {
        json!({ "redemption_id": Uuid::new_v4(), "code": code, "amount": amount })
    }

    #[tokio::test]
    async fn test_issue_then_partial_redemptions() {
        // Arrange
        let app = TestApp::new();
        let voucher = issue(&app, 5_000).await;
        assert_eq!(voucher["code"], "GIFT-ROUT-0001");

        // Act
        let (first, first_json) = send(
            router().with_state(app.state.clone()),
            "POST",
            "/redeem",
            Some(POS_TOKEN),
            Some(&redeem_body("gift-rout-0001", 3_000)),
        )
        .await;
        let (second, second_json) = send(
            router().with_state(app.state.clone()),
            "POST",
            "/redeem",
            Some(POS_TOKEN),
            Some(&redeem_body("GIFT-ROUT-0001", 2_500)),
        )
        .await;

        // Assert
        assert_eq!(first, StatusCode::OK);
        assert_eq!(first_json["remaining"], 2_000);
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(second_json["outcome"], "rejected");
        assert_eq!(second_json["reason"], "insufficient_balance");
        assert_eq!(second_json["remaining"], 2_000);
        assert_eq!(app.store.snapshot().await.vouchers[0].amount_remaining, 2_000);
    }

    #[tokio::test]
    async fn test_issue_defaults_expiry_to_validity() {
        let app = TestApp::new();

        let voucher = issue(&app, 1_000).await;

        let expires_at: DateTime<Utc> =
            serde_json::from_value(voucher["expires_at"].clone()).unwrap();
        assert_eq!(expires_at, fixed_now() + chrono::Duration::days(365));
    }

    #[tokio::test]
    async fn test_redeem_unknown_code_returns_404() {
        let app = TestApp::new();

        let (status, json) = send(
            router().with_state(app.state),
            "POST",
            "/redeem",
            Some(ADMIN_TOKEN),
            Some(&redeem_body("GIFT-NONE-0000", 100)),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["reason"], "not_found");
    }

    #[tokio::test]
    async fn test_get_voucher_requires_staff() {
        let app = TestApp::new();
        issue(&app, 1_000).await;

        let (anonymous, _) = send(
            router().with_state(app.state.clone()),
            "GET",
            "/GIFT-ROUT-0001",
            None,
            None,
        )
        .await;
        let (status, json) = send(
            router().with_state(app.state.clone()),
            "GET",
            "/GIFT-ROUT-0001",
            Some(ADMIN_TOKEN),
            None,
        )
        .await;

        assert_eq!(anonymous, StatusCode::UNAUTHORIZED);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["amount_remaining"], 1_000);
        assert_eq!(json["status"], "active");
    }

    #[tokio::test]
    async fn test_expire_is_admin_only() {
        let app = TestApp::new();
        app.store
            .seed(|state| {
                state.vouchers.push(VoucherRecord {
                    id: Uuid::new_v4(),
                    code: "GIFT-OLDD-0001".into(),
                    amount_initial: 1_000,
                    amount_remaining: 1_000,
                    status: VoucherStatus::Active,
                    buyer_id: None,
                    recipient: None,
                    expires_at: Some(fixed_now() - chrono::Duration::days(1)),
                    issued_at: fixed_now() - chrono::Duration::days(400),
                });
            })
            .await;

        let (till, _) = send(
            router().with_state(app.state.clone()),
            "POST",
            "/expire",
            Some(POS_TOKEN),
            None,
        )
        .await;
        let (admin, json) = send(
            router().with_state(app.state.clone()),
            "POST",
            "/expire",
            Some(ADMIN_TOKEN),
            None,
        )
        .await;

        assert_eq!(till, StatusCode::FORBIDDEN);
        assert_eq!(admin, StatusCode::OK);
        assert_eq!(json["expired"], 1);
    }
}
