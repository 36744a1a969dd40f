//! Staff authentication.
//!
//! Staff endpoints take `Authorization: Bearer <token>`. The token selects
//! the role; `X-Actor-Id` names the person or till and defaults to the role
//! name. Role checks themselves happen in the operations.

use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use marginalia_core::actor::{Actor, StaffRole};

use crate::error::ErrorBody;
use crate::state::AppState;

/// Header carrying the staff member's identifier.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Bearer tokens recognised for each staff role.
#[derive(Debug, Clone)]
pub struct StaffTokens {
    /// Token granting the admin role.
    pub admin: String,
    /// Token granting the point-of-sale role.
    pub point_of_sale: Option<String>,
}

impl StaffTokens {
    /// Returns the role granted by `token`, if any.
    #[must_use]
    pub fn role_for(&self, token: &str) -> Option<StaffRole> {
        if token == self.admin {
            Some(StaffRole::Admin)
        } else if self.point_of_sale.as_deref() == Some(token) {
            Some(StaffRole::PointOfSale)
        } else {
            None
        }
    }
}

/// An authenticated staff member.
#[derive(Debug, Clone)]
pub struct StaffActor(pub Actor);

/// Missing or unrecognised credentials.
#[derive(Debug)]
pub struct AuthRejection(&'static str);

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        ErrorBody {
            error: "unauthenticated",
            message: self.0.to_owned(),
        }
        .into_response_with(StatusCode::UNAUTHORIZED)
    }
}

impl FromRequestParts<AppState> for StaffActor {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AuthRejection("missing bearer token"))?;

        let role = state
            .staff_tokens
            .role_for(token)
            .ok_or(AuthRejection("unrecognised bearer token"))?;

        let id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(role.as_str());

        Ok(Self(Actor::new(id, role)))
    }
}
