//! Routes for shop orders.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use marginalia_checkout::application::{command_handlers, query_handlers};
use marginalia_checkout::domain::commands;
use marginalia_checkout::domain::orders::PlaceOrderOutcome;
use marginalia_core::model::{MinorUnits, OrderLine, VoucherApplication};
use marginalia_vouchers::domain::ledger::RedeemRejection;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    /// Idempotency key chosen by the caller.
    pub request_id: Uuid,
    /// The customer.
    pub requester_id: Uuid,
    /// What is being bought.
    pub lines: Vec<OrderLine>,
    /// Voucher to put towards the order.
    pub voucher: Option<VoucherApplication>,
}

/// Response body for POST /.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlaceOrderResponse {
    /// The order is pending payment.
    Placed {
        /// The new order.
        order_id: Uuid,
        /// What the customer still pays.
        amount_due: MinorUnits,
        /// `true` when the request id had already been placed.
        replayed: bool,
    },
    /// The voucher cannot cover the amount asked for.
    VoucherRejected {
        /// Why not.
        voucher: RedeemRejection,
    },
}

/// POST /
#[instrument(skip_all, fields(request_id = %request.request_id, lines = request.lines.len()))]
async fn place_order(
    State(state): State<AppState>,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>), ApiError> {
    let command = commands::PlaceOrder {
        request_id: request.request_id,
        requester_id: request.requester_id,
        lines: request.lines,
        voucher: request.voucher,
    };

    let outcome =
        command_handlers::handle_place_order(&command, state.clock.as_ref(), state.store.as_ref())
            .await?;

    let (status, body) = match outcome {
        PlaceOrderOutcome::Placed {
            order_id,
            amount_due,
            replayed,
        } => {
            info!(%order_id, amount_due, replayed, "order placed");
            let status = if replayed {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (
                status,
                PlaceOrderResponse::Placed {
                    order_id,
                    amount_due,
                    replayed,
                },
            )
        }
        PlaceOrderOutcome::VoucherRejected(voucher) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            PlaceOrderResponse::VoucherRejected { voucher },
        ),
    };

    Ok((status, Json(body)))
}

/// GET /{id}
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<query_handlers::OrderView>, ApiError> {
    let view = query_handlers::get_order(order_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// Returns the router for orders.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order))
        .route("/{id}", get(get_order))
}
