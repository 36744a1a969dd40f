//! Routes for event bookings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use marginalia_booking::application::{command_handlers, query_handlers};
use marginalia_booking::domain::admission::{AdmissionOutcome, AdmissionRejection};
use marginalia_booking::domain::commands;
use marginalia_core::model::BookingRecord;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct AdmitRequest {
    /// Idempotency key chosen by the caller.
    pub request_id: Uuid,
    /// The event to book.
    pub event_id: Uuid,
    /// The customer.
    pub requester_id: Uuid,
}

/// Response body for POST /.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdmitResponse {
    /// A place was reserved.
    Admitted {
        /// The pending booking.
        booking_id: Uuid,
        /// `true` when the request id had already been admitted.
        replayed: bool,
    },
    /// No booking was created.
    Rejected {
        /// Why not.
        reason: AdmissionRejection,
    },
}

/// POST /
#[instrument(skip_all, fields(event_id = %request.event_id, request_id = %request.request_id))]
async fn admit(
    State(state): State<AppState>,
    Json(request): Json<AdmitRequest>,
) -> Result<(StatusCode, Json<AdmitResponse>), ApiError> {
    let command = commands::AdmitBooking {
        request_id: request.request_id,
        event_id: request.event_id,
        requester_id: request.requester_id,
    };

    let outcome =
        command_handlers::handle_admit(&command, state.clock.as_ref(), state.store.as_ref())
            .await?;

    let (status, body) = match outcome {
        AdmissionOutcome::Admitted {
            booking_id,
            replayed,
        } => {
            info!(%booking_id, replayed, "booking admitted");
            let status = if replayed {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (
                status,
                AdmitResponse::Admitted {
                    booking_id,
                    replayed,
                },
            )
        }
        AdmissionOutcome::Rejected(reason) => {
            let status = match reason {
                AdmissionRejection::SoldOut => StatusCode::CONFLICT,
                AdmissionRejection::EventNotFound => StatusCode::NOT_FOUND,
            };
            (status, AdmitResponse::Rejected { reason })
        }
    };

    Ok((status, Json(body)))
}

/// GET /{id}
async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<query_handlers::BookingView>, ApiError> {
    let view = query_handlers::get_booking(booking_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// POST /{id}/cancel
#[instrument(skip_all, fields(booking_id = %booking_id))]
async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingRecord>, ApiError> {
    let command = commands::CancelBooking {
        request_id: Uuid::now_v7(),
        booking_id,
    };

    let booking = command_handlers::handle_cancel_booking(
        &command,
        state.clock.as_ref(),
        state.store.as_ref(),
    )
    .await?;

    Ok(Json(booking))
}

/// Returns the router for bookings.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(admit))
        .route("/{id}", get(get_booking))
        .route("/{id}/cancel", post(cancel_booking))
}
