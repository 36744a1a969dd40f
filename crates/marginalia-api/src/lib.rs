//! Marginalia API: axum HTTP surface for the commerce core.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod sweep;

use axum::Router;

use crate::state::AppState;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/events", routes::events::router())
        .nest("/api/v1/bookings", routes::bookings::router())
        .nest("/api/v1/orders", routes::orders::router())
        .nest("/api/v1/checkout", routes::checkout::router())
        .nest("/api/v1/payments", routes::payments::router())
        .nest("/api/v1/vouchers", routes::vouchers::router())
        .nest("/api/v1/inventory", routes::inventory::router())
        .with_state(state)
}
