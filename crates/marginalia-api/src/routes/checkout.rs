//! Routes for issuing payment sessions.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use marginalia_checkout::application::{command_handlers, query_handlers};
use marginalia_checkout::domain::commands;
use marginalia_checkout::domain::issuance::{IssueOutcome, IssueRefusal};
use marginalia_core::model::{DomainKind, MinorUnits};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct IssueCheckoutRequest {
    /// Kind of record being paid for.
    pub kind: DomainKind,
    /// The booking or order.
    pub domain_id: Uuid,
    /// Amount to charge; must equal the record's amount due.
    pub amount: MinorUnits,
    /// Shown to the customer on the payment page.
    pub description: String,
    /// Receipt address.
    pub contact_email: String,
    /// Overrides the configured currency.
    pub currency: Option<String>,
}

/// Response body for POST /.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IssueCheckoutResponse {
    /// A payment session was created.
    Issued {
        /// Provider session id.
        session_id: String,
        /// Where to send the customer.
        checkout_url: String,
    },
    /// No session was created.
    Refused {
        /// Why not.
        refusal: IssueRefusal,
    },
}

/// Query string for GET /amount-due.
#[derive(Debug, Deserialize)]
pub struct AmountDueQuery {
    /// Kind of record.
    pub kind: DomainKind,
    /// The booking or order.
    pub domain_id: Uuid,
}

/// POST /
#[instrument(skip_all, fields(kind = %request.kind, domain_id = %request.domain_id))]
async fn issue_checkout(
    State(state): State<AppState>,
    Json(request): Json<IssueCheckoutRequest>,
) -> Result<(StatusCode, Json<IssueCheckoutResponse>), ApiError> {
    let command = commands::IssueCheckout {
        kind: request.kind,
        domain_id: request.domain_id,
        amount: request.amount,
        currency: request.currency.unwrap_or_else(|| state.currency.clone()),
        description: request.description,
        contact_email: request.contact_email,
    };

    let outcome = command_handlers::handle_issue_checkout(
        &command,
        state.clock.as_ref(),
        state.gateway.as_ref(),
        state.store.as_ref(),
    )
    .await?;

    let (status, body) = match outcome {
        IssueOutcome::Issued(handle) => {
            info!(session_id = %handle.session_id, "checkout issued");
            (
                StatusCode::CREATED,
                IssueCheckoutResponse::Issued {
                    session_id: handle.session_id,
                    checkout_url: handle.checkout_url,
                },
            )
        }
        IssueOutcome::Refused(refusal) => {
            let status = match refusal {
                IssueRefusal::NotFound => StatusCode::NOT_FOUND,
                IssueRefusal::NotPending { .. } | IssueRefusal::AmountMismatch { .. } => {
                    StatusCode::CONFLICT
                }
            };
            (status, IssueCheckoutResponse::Refused { refusal })
        }
    };

    Ok((status, Json(body)))
}

/// GET /amount-due
async fn amount_due(
    State(state): State<AppState>,
    Query(query): Query<AmountDueQuery>,
) -> Result<Json<query_handlers::AmountDueView>, ApiError> {
    let view = query_handlers::amount_due(query.kind, query.domain_id, state.store.as_ref()).await?;
    Ok(Json(view))
}

/// Returns the router for checkout.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(issue_checkout))
        .route("/amount-due", get(amount_due))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{TestApp, send};
    use marginalia_core::model::{BookingRecord, EventRecord, RecordStatus};
    use marginalia_test_support::fixed_now;
    use serde_json::json;

    async fn seed_booking(app: &TestApp, status: RecordStatus) -> Uuid {
        let event_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();
        app.store
            .seed(|state| {
                state.events.insert(
                    event_id,
                    EventRecord {
                        id: event_id,
                        title: "Launch party".into(),
                        capacity: 30,
                        unit_price: 1_500,
                        created_at: fixed_now(),
                    },
                );
                state.bookings.push(BookingRecord {
                    id: booking_id,
                    event_id,
                    requester_id: Uuid::new_v4(),
                    status,
                    request_id: Uuid::new_v4(),
                    created_at: fixed_now(),
                    updated_at: fixed_now(),
                });
            })
            .await;
        booking_id
    }

    fn issue_body(domain_id: Uuid, amount: i64) -> serde_json::Value {
        json!({
            "kind": "booking",
            "domain_id": domain_id,
            "amount": amount,
            "description": "Launch party",
            "contact_email": "reader@example.com"
        })
    }

    #[tokio::test]
    async fn test_issue_checkout_returns_session() {
        // Arrange
        let app = TestApp::new();
        let booking_id = seed_booking(&app, RecordStatus::Pending).await;

        // Act
        let (status, json) = send(
            router().with_state(app.state.clone()),
            "POST",
            "/",
            None,
            Some(&issue_body(booking_id, 1_500)),
        )
        .await;

        // Assert
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["outcome"], "issued");
        assert_eq!(json["session_id"], "cs_test_1");
        let created = app.gateway.created_sessions();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].currency, "gbp");
        assert_eq!(created[0].metadata.domain_id, booking_id);
        assert_eq!(app.store.snapshot().await.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_issue_checkout_for_paid_booking_is_refused() {
        let app = TestApp::new();
        let booking_id = seed_booking(&app, RecordStatus::Paid).await;

        let (status, json) = send(
            router().with_state(app.state.clone()),
            "POST",
            "/",
            None,
            Some(&issue_body(booking_id, 1_500)),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["refusal"]["reason"], "not_pending");
        assert_eq!(json["refusal"]["status"], "paid");
        assert!(app.gateway.created_sessions().is_empty());
    }

    #[tokio::test]
    async fn test_issue_checkout_with_wrong_amount_is_refused() {
        let app = TestApp::new();
        let booking_id = seed_booking(&app, RecordStatus::Pending).await;

        let (status, json) = send(
            router().with_state(app.state),
            "POST",
            "/",
            None,
            Some(&issue_body(booking_id, 999)),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["refusal"]["reason"], "amount_mismatch");
        assert_eq!(json["refusal"]["expected"], 1_500);
    }

    #[tokio::test]
    async fn test_amount_due_for_booking() {
        let app = TestApp::new();
        let booking_id = seed_booking(&app, RecordStatus::Pending).await;

        let (status, json) = send(
            router().with_state(app.state),
            "GET",
            &format!("/amount-due?kind=booking&domain_id={booking_id}"),
            None,
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["amount_due"], 1_500);
    }
}
