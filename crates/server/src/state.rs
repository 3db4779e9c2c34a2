//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::{PgShopStore, ShopTokenStore};
use crate::shopify::AdminGateway;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    shops: Arc<dyn ShopTokenStore>,
    gateway: AdminGateway,
}

impl AppState {
    /// Create a new application state over a database pool.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let shops: Arc<dyn ShopTokenStore> = Arc::new(PgShopStore::new(pool.clone()));
        let gateway = AdminGateway::new(&config.shopify, Arc::clone(&shops));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                shops,
                gateway,
            }),
        }
    }

    /// Create state with an explicit store and gateway. Used by tests to
    /// swap in an in-memory store and a mock-server gateway.
    #[must_use]
    pub fn with_parts(
        config: ServerConfig,
        pool: PgPool,
        shops: Arc<dyn ShopTokenStore>,
        gateway: AdminGateway,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                shops,
                gateway,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the shop credential store.
    #[must_use]
    pub fn shops(&self) -> &Arc<dyn ShopTokenStore> {
        &self.inner.shops
    }

    /// Get a reference to the Admin API gateway.
    #[must_use]
    pub fn gateway(&self) -> &AdminGateway {
        &self.inner.gateway
    }
}
