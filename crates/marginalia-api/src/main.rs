//! Marginalia API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use marginalia_api::auth::StaffTokens;
use marginalia_api::config::AppConfig;
use marginalia_api::error::AppError;
use marginalia_api::state::AppState;
use marginalia_api::sweep::VoucherSweeper;
use marginalia_core::clock::SystemClock;
use marginalia_core::codes::RandomCodeGenerator;
use marginalia_gateway::{HttpGatewayConfig, HttpPaymentGateway};
use marginalia_payments::domain::signature::WebhookVerifier;
use marginalia_store::pg_commerce_store::PgCommerceStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // A missing .env file is fine; real deployments set the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Marginalia API server");

    let config = AppConfig::from_env()?;

    let pool =
        marginalia_store::connect(&config.database_url, config.database_max_connections).await?;
    if config.run_migrations {
        marginalia_store::migrate(&pool).await?;
        tracing::info!("migrations applied");
    }

    let gateway = HttpPaymentGateway::new(HttpGatewayConfig {
        base_url: config.payment_api_base_url.clone(),
        api_key: config.payment_api_key.clone(),
        success_url: config.checkout_success_url.clone(),
        cancel_url: config.checkout_cancel_url.clone(),
        timeout: std::time::Duration::from_secs(10),
    })?;

    let app_state = AppState {
        store: Arc::new(PgCommerceStore::new(pool)),
        gateway: Arc::new(gateway),
        clock: Arc::new(SystemClock),
        codes: Arc::new(RandomCodeGenerator),
        verifier: WebhookVerifier::new(
            config.payment_webhook_secret.as_bytes(),
            config.payment_webhook_tolerance,
        ),
        staff_tokens: StaffTokens {
            admin: config.admin_api_token.clone(),
            point_of_sale: config.pos_api_token.clone(),
        },
        currency: config.payment_currency.clone(),
        voucher_validity: config.voucher_validity,
    };

    let _sweeper = VoucherSweeper::new(
        Arc::clone(&app_state.store),
        Arc::clone(&app_state.clock),
        config.voucher_sweep_interval,
    )
    .spawn();

    // TODO: Replace CorsLayer::permissive() with the shop's origins once the storefront domain is fixed.
    let app = marginalia_api::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
