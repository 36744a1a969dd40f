//! Routes for event management.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use marginalia_booking::application::{command_handlers, query_handlers};
use marginalia_booking::domain::commands;
use marginalia_core::model::{EventRecord, MinorUnits};

use crate::auth::StaffActor;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    /// Caller-chosen id; a repeat with the same id is a conflict.
    pub event_id: Option<Uuid>,
    /// Display title.
    pub title: String,
    /// Number of places.
    pub capacity: i32,
    /// Price of one place in minor units.
    pub unit_price: MinorUnits,
}

/// Request body for PUT /{id}/capacity.
#[derive(Debug, Deserialize)]
pub struct SetCapacityRequest {
    /// New number of places.
    pub capacity: i32,
}

/// POST /
#[instrument(skip_all, fields(actor = %actor.id))]
async fn create_event(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
    Json(request): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventRecord>), ApiError> {
    let command = commands::CreateEvent {
        event_id: request.event_id.unwrap_or_else(Uuid::now_v7),
        title: request.title,
        capacity: request.capacity,
        unit_price: request.unit_price,
    };

    info!(event_id = %command.event_id, "handling create_event command");

    let event = command_handlers::handle_create_event(
        &command,
        &actor,
        state.clock.as_ref(),
        state.store.as_ref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /{id}
async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<query_handlers::EventView>, ApiError> {
    let view = query_handlers::get_event(event_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// PUT /{id}/capacity
#[instrument(skip_all, fields(event_id = %event_id, actor = %actor.id))]
async fn set_capacity(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
    Path(event_id): Path<Uuid>,
    Json(request): Json<SetCapacityRequest>,
) -> Result<Json<EventRecord>, ApiError> {
    let command = commands::SetCapacity {
        request_id: Uuid::now_v7(),
        event_id,
        capacity: request.capacity,
    };

    let event =
        command_handlers::handle_set_capacity(&command, &actor, state.store.as_ref()).await?;

    Ok(Json(event))
}

/// Returns the router for event management.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_event))
        .route("/{id}", get(get_event))
        .route("/{id}/capacity", put(set_capacity))
}
