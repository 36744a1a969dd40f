//! Routes for payment notifications and confirmation.
//!
//! The provider retries any notification answered with a non-2xx status.
//! Everything that was recorded or parked for review is acknowledged with
//! 200; a ledger conflict answers 409 so the provider redelivers once an
//! operator has corrected the ledger.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use marginalia_core::error::DomainError;
use marginalia_core::model::{DomainKind, FlaggedPaymentEvent};
use marginalia_payments::application::command_handlers::{self, ConfirmPayment};
use marginalia_payments::application::query_handlers;
use marginalia_payments::domain::outcome::{
    IgnoreReason, ReconcileOutcome, RejectReason, Transition,
};

use crate::auth::StaffActor;
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the provider's notification signature.
pub const SIGNATURE_HEADER: &str = "payment-signature";

/// Request body for POST /confirm. Either `session_id`, or both `kind` and
/// `domain_id`.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    /// Session the customer returned from.
    pub session_id: Option<String>,
    /// Kind of record paid for.
    pub kind: Option<DomainKind>,
    /// The booking or order.
    pub domain_id: Option<Uuid>,
}

impl TryFrom<ConfirmRequest> for ConfirmPayment {
    type Error = DomainError;

    fn try_from(request: ConfirmRequest) -> Result<Self, Self::Error> {
        match request {
            ConfirmRequest {
                session_id: Some(session_id),
                kind: None,
                domain_id: None,
            } if !session_id.trim().is_empty() => Ok(Self::Session { session_id }),
            ConfirmRequest {
                session_id: None,
                kind: Some(kind),
                domain_id: Some(domain_id),
            } => Ok(Self::Record { kind, domain_id }),
            _ => Err(DomainError::Validation(
                "give either session_id or kind with domain_id".into(),
            )),
        }
    }
}

/// Response body for reconciliation.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileResponse {
    /// State moved.
    Applied {
        /// What moved.
        #[serde(flatten)]
        transition: Transition,
    },
    /// Nothing to do.
    Ignored {
        /// Why.
        reason: IgnoreReason,
    },
    /// Refused.
    Rejected {
        /// Why.
        reason: RejectReason,
    },
}

fn respond(outcome: ReconcileOutcome) -> (StatusCode, Json<ReconcileResponse>) {
    let (status, body) = match outcome {
        ReconcileOutcome::Applied(transition) => {
            (StatusCode::OK, ReconcileResponse::Applied { transition })
        }
        ReconcileOutcome::Ignored(reason) => (StatusCode::OK, ReconcileResponse::Ignored { reason }),
        ReconcileOutcome::Rejected(reason) => {
            let status = match reason {
                RejectReason::BadSignature => StatusCode::BAD_REQUEST,
                RejectReason::Inconsistent | RejectReason::DuplicatePayment => StatusCode::OK,
                RejectReason::LedgerConflict => StatusCode::CONFLICT,
            };
            (status, ReconcileResponse::Rejected { reason })
        }
    };
    (status, Json(body))
}

/// POST /webhook
#[instrument(skip_all, fields(body_len = body.len()))]
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<ReconcileResponse>), ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = command_handlers::handle_webhook(
        &body,
        signature,
        &state.verifier,
        state.reconcile_context(),
    )
    .await?;

    info!(?outcome, "payment notification handled");
    Ok(respond(outcome))
}

/// POST /confirm
#[instrument(skip_all)]
async fn confirm(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<(StatusCode, Json<ReconcileResponse>), ApiError> {
    let request = ConfirmPayment::try_from(request)?;

    let outcome = command_handlers::handle_confirm(
        &request,
        state.gateway.as_ref(),
        state.reconcile_context(),
    )
    .await?;

    info!(?outcome, "payment confirmation handled");
    Ok(respond(outcome))
}

/// GET /flagged
async fn flagged(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
) -> Result<Json<Vec<FlaggedPaymentEvent>>, ApiError> {
    let flagged = query_handlers::flagged_events(&actor, state.store.as_ref()).await?;
    Ok(Json(flagged))
}

/// Returns the router for payments.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/confirm", post(confirm))
        .route("/flagged", get(flagged))
}
