//! Call log storage
//!
//! PostgreSQL via sqlx when a database is configured, otherwise an in-memory
//! log that lives as long as the relay process.

pub mod calls;

pub use calls::{CallLogStore, MemoryCallLog, PgCallLog, StoreError};

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

/// Initialize the database connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
