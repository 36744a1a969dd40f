mod common;

use axum::http::StatusCode;

#[sqlx::test(migrations = "../../migrations")]
async fn test_health_returns_ok(pool: sqlx::PgPool) {
    let app = common::build_test_app(pool);

    let (status, json) = common::get_json(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_unknown_route_returns_404(pool: sqlx::PgPool) {
    let app = common::build_test_app(pool);

    let (status, _) = common::get_json(&app.router, "/api/v1/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
