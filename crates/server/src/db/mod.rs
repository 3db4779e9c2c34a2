//! Database operations for the `shops` credential table.
//!
//! The table mirrors the token-exchange payload verbatim: one row per shop
//! domain, with the raw JSON in a `TEXT` column. Shopify remains the source
//! of truth for everything else.
//!
//! Migrations live in `crates/server/migrations/`.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

mod shops;

pub use shops::{InMemoryShopStore, PgShopStore, ShopCredential, ShopTokenStore};

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored credential payload is not valid JSON.
    #[error("Invalid stored payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
