//! Shop credential storage.
//!
//! Stores the raw token-exchange response per shop. Access is behind the
//! [`ShopTokenStore`] trait so the gateway and workflow can run against an
//! in-memory store in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;

use super::RepositoryError;

/// A stored shop credential.
///
/// `payload` is the token-exchange response as Shopify returned it.
/// Implements `Debug` manually to redact the access token inside.
#[derive(Clone)]
pub struct ShopCredential {
    /// Shop domain (e.g., your-store.myshopify.com).
    pub shop: String,
    /// Raw token-exchange payload (contains the access token).
    pub payload: serde_json::Value,
}

impl std::fmt::Debug for ShopCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopCredential")
            .field("shop", &self.shop)
            .field("payload", &"[REDACTED]")
            .finish()
    }
}

impl ShopCredential {
    /// The access token, if the payload carries one.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.payload.get("access_token")?.as_str()
    }

    /// The stored record with the access token masked, safe to serve.
    #[must_use]
    pub fn redacted(&self) -> serde_json::Value {
        let mut payload = self.payload.clone();
        if let Some(token) = payload.get_mut("access_token") {
            *token = serde_json::Value::String("[REDACTED]".to_string());
        }
        serde_json::json!({
            "_id": self.shop,
            "data": payload,
        })
    }
}

/// Persistence seam for shop credentials.
///
/// Writes are split into `insert` and `update` on purpose: a token refresh
/// for a known shop must not create a second row, and a lost row must not be
/// silently resurrected by an update.
#[async_trait]
pub trait ShopTokenStore: Send + Sync {
    /// Fetch the credential for a shop.
    async fn get(&self, shop: &str) -> Result<Option<ShopCredential>, RepositoryError>;

    /// Insert a credential for a shop not yet known.
    async fn insert(&self, shop: &str, payload: &serde_json::Value)
    -> Result<(), RepositoryError>;

    /// Replace the credential of a known shop. Returns the number of rows
    /// touched; zero means the shop was never inserted.
    async fn update(&self, shop: &str, payload: &serde_json::Value)
    -> Result<u64, RepositoryError>;

    /// Insert or update depending on whether the shop is already known.
    async fn save(&self, shop: &str, payload: &serde_json::Value) -> Result<(), RepositoryError> {
        if self.get(shop).await?.is_none() {
            self.insert(shop, payload).await
        } else {
            self.update(shop, payload).await?;
            Ok(())
        }
    }
}

/// `PostgreSQL`-backed credential store over the `shops` table.
pub struct PgShopStore {
    pool: PgPool,
}

impl PgShopStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShopRow {
    _id: String,
    data: String,
}

#[async_trait]
impl ShopTokenStore for PgShopStore {
    async fn get(&self, shop: &str) -> Result<Option<ShopCredential>, RepositoryError> {
        let row: Option<ShopRow> =
            sqlx::query_as(r"SELECT _id, data FROM shops WHERE _id = $1")
                .bind(shop)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|row| {
            Ok(ShopCredential {
                shop: row._id,
                payload: serde_json::from_str(&row.data)?,
            })
        })
        .transpose()
    }

    async fn insert(
        &self,
        shop: &str,
        payload: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shops (_id, data, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ",
        )
        .bind(shop)
        .bind(payload.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(
        &self,
        shop: &str,
        payload: &serde_json::Value,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shops
            SET data = $2, updated_at = $3
            WHERE _id = $1
            ",
        )
        .bind(shop)
        .bind(payload.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// In-memory credential store for tests and local development.
#[derive(Default)]
pub struct InMemoryShopStore {
    shops: RwLock<HashMap<String, serde_json::Value>>,
}

impl InMemoryShopStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShopTokenStore for InMemoryShopStore {
    async fn get(&self, shop: &str) -> Result<Option<ShopCredential>, RepositoryError> {
        Ok(self.shops.read().await.get(shop).map(|payload| {
            ShopCredential {
                shop: shop.to_string(),
                payload: payload.clone(),
            }
        }))
    }

    async fn insert(
        &self,
        shop: &str,
        payload: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        self.shops
            .write()
            .await
            .insert(shop.to_string(), payload.clone());
        Ok(())
    }

    async fn update(
        &self,
        shop: &str,
        payload: &serde_json::Value,
    ) -> Result<u64, RepositoryError> {
        let mut shops = self.shops.write().await;
        match shops.get_mut(shop) {
            Some(stored) => {
                *stored = payload.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
