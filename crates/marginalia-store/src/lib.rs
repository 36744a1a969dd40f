//! Marginalia Store: `PostgreSQL` implementation of the commerce store.
//!
//! Each unit of work is one database transaction. `lock_*` methods use
//! `SELECT … FOR UPDATE`; idempotency keys and voucher codes rely on unique
//! constraints with `ON CONFLICT DO NOTHING`.

pub mod pg_commerce_store;
mod rows;

use std::time::Duration;

use marginalia_core::error::DomainError;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Opens a connection pool.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the database is unreachable.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, DomainError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|e| DomainError::Infrastructure(format!("database connection failed: {e}")))
}

/// Applies pending migrations.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<(), DomainError> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| DomainError::Infrastructure(format!("migration failed: {e}")))
}
