//! Routes for the Inventory ledger.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use marginalia_core::model::StockMovement;
use marginalia_inventory::application::{command_handlers, query_handlers};
use marginalia_inventory::domain::commands;
use marginalia_inventory::domain::stock::{AdjustOutcome, AdjustRejection};

use crate::auth::StaffActor;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /adjust.
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    /// Idempotency key; also the movement's id.
    pub movement_id: Uuid,
    /// The product.
    pub product_id: Uuid,
    /// Signed change in units.
    pub delta: i64,
    /// Why the stock changed.
    pub reason: String,
}

/// Response body for POST /adjust.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdjustResponse {
    /// The movement was recorded.
    Applied {
        /// Balance afterwards.
        balance: i64,
        /// `true` when the movement id had already been applied.
        replayed: bool,
    },
    /// Nothing changed.
    Rejected {
        /// Why not.
        #[serde(flatten)]
        rejection: AdjustRejection,
    },
}

/// POST /adjust
#[instrument(skip_all, fields(product_id = %request.product_id, delta = request.delta, actor = %actor.id))]
async fn adjust(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
    Json(request): Json<AdjustRequest>,
) -> Result<(StatusCode, Json<AdjustResponse>), ApiError> {
    let command = commands::AdjustStock {
        movement_id: request.movement_id,
        product_id: request.product_id,
        delta: request.delta,
        reason: request.reason,
    };

    let outcome = command_handlers::handle_adjust_stock(
        &command,
        &actor,
        state.clock.as_ref(),
        state.store.as_ref(),
    )
    .await?;

    let (status, body) = match outcome {
        AdjustOutcome::Applied { balance, replayed } => {
            (StatusCode::OK, AdjustResponse::Applied { balance, replayed })
        }
        AdjustOutcome::Rejected(rejection) => {
            (StatusCode::CONFLICT, AdjustResponse::Rejected { rejection })
        }
    };

    Ok((status, Json(body)))
}

/// GET /{product_id}
async fn balance(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<query_handlers::StockView>, ApiError> {
    let view = query_handlers::balance_of(product_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// GET /{product_id}/movements
async fn movements(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<StockMovement>>, ApiError> {
    let movements =
        query_handlers::movements_of(product_id, &actor, state.store.as_ref()).await?;
    Ok(Json(movements))
}

/// Returns the router for the inventory context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/adjust", post(adjust))
        .route("/{product_id}", get(balance))
        .route("/{product_id}/movements", get(movements))
}
