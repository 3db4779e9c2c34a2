use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Serialize;

use crate::config::ShopifyAppConfig;
use crate::db::ShopTokenStore;

use super::ShopifyError;

/// User agent sent on every Admin API call.
const USER_AGENT: &str = "Burst_Shopify_App";

/// Per-request timeout covering connect, send and body read.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A GraphQL request body.
#[derive(Debug, Serialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

/// Result of an OAuth token exchange.
///
/// Keeps the raw payload so the store persists exactly what Shopify sent.
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct ExchangedToken {
    access_token: String,
    raw: serde_json::Value,
}

impl std::fmt::Debug for ExchangedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangedToken")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl ExchangedToken {
    /// The access token string.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The full exchange payload for persistence.
    #[must_use]
    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }
}

/// Shopify Admin API gateway with per-shop credential resolution.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AdminGateway {
    inner: Arc<AdminGatewayInner>,
}

struct AdminGatewayInner {
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
    api_version: String,
    scopes: String,
    store: Arc<dyn ShopTokenStore>,
    /// Routes all shop traffic to one host instead of `https://{shop}`.
    /// Used by tests against a mock server.
    base_url_override: Option<String>,
}

impl AdminGateway {
    /// Create a new gateway backed by the given credential store.
    #[must_use]
    pub fn new(config: &ShopifyAppConfig, store: Arc<dyn ShopTokenStore>) -> Self {
        Self::build(config, store, None)
    }

    /// Create a gateway that sends all shop traffic to `base_url`.
    #[must_use]
    pub fn with_base_url(
        config: &ShopifyAppConfig,
        store: Arc<dyn ShopTokenStore>,
        base_url: &str,
    ) -> Self {
        Self::build(config, store, Some(base_url.trim_end_matches('/').to_string()))
    }

    fn build(
        config: &ShopifyAppConfig,
        store: Arc<dyn ShopTokenStore>,
        base_url_override: Option<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            inner: Arc::new(AdminGatewayInner {
                client,
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.expose_secret().to_string(),
                api_version: config.api_version.clone(),
                scopes: config.scopes.clone(),
                store,
                base_url_override,
            }),
        }
    }

    /// Get the app API secret (for request signature checks).
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.inner.api_secret
    }

    fn shop_base(&self, shop: &str) -> String {
        self.inner
            .base_url_override
            .clone()
            .unwrap_or_else(|| format!("https://{shop}"))
    }

    /// Generate the OAuth authorization URL a merchant is redirected to.
    ///
    /// `app_url` is this app's public base URL; the callback lands on
    /// `{app_url}/callback`.
    #[must_use]
    pub fn authorization_url(&self, shop: &str, app_url: &str) -> String {
        format!(
            "https://{shop}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state=&grant_options[]=",
            urlencoding::encode(&self.inner.api_key),
            urlencoding::encode(&self.inner.scopes),
            urlencoding::encode(&format!("{app_url}/callback")),
        )
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` when the response carries no
    /// `access_token`, `ShopifyError::Http` when the request fails.
    pub async fn exchange_code(
        &self,
        shop: &str,
        code: &str,
    ) -> Result<ExchangedToken, ShopifyError> {
        let url = format!("{}/admin/oauth/access_token", self.shop_base(shop));

        let params = [
            ("client_id", self.inner.api_key.as_str()),
            ("client_secret", self.inner.api_secret.as_str()),
            ("code", code),
        ];

        let response = self.inner.client.post(&url).form(&params).send().await?;
        let raw: serde_json::Value = response.json().await?;

        let access_token = raw
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ShopifyError::OAuth(format!("no access_token in exchange response for {shop}"))
            })?
            .to_string();

        Ok(ExchangedToken { access_token, raw })
    }

    /// Execute a GraphQL document against a shop's Admin API.
    ///
    /// With `token` set the call uses it directly (needed during install,
    /// before anything is persisted); otherwise the credential is resolved
    /// from the store. The response body is returned as-is: GraphQL `errors`
    /// inside a 200 body are not a dispatch failure here.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::NoCredential` when no token is stored for the
    /// shop, `ShopifyError::Http`/`Parse` on transport or body failures.
    pub async fn dispatch(
        &self,
        shop: &str,
        query: &str,
        variables: Option<serde_json::Value>,
        token: Option<&str>,
    ) -> Result<serde_json::Value, ShopifyError> {
        let access_token = match token {
            Some(token) => token.to_string(),
            None => self
                .inner
                .store
                .get(shop)
                .await?
                .and_then(|credential| credential.access_token().map(str::to_string))
                .ok_or_else(|| ShopifyError::NoCredential(shop.to_string()))?,
        };

        let endpoint = format!(
            "{}/admin/api/{}/graphql.json",
            self.shop_base(shop),
            self.inner.api_version
        );

        // Queries are written as readable multi-line strings; the wire
        // format is a single line.
        let body = GraphQLRequest {
            query: query.replace('\n', ""),
            variables,
        };

        let response = self
            .inner
            .client
            .post(&endpoint)
            .header("X-Shopify-Access-Token", &access_token)
            .json(&body)
            .send()
            .await?;

        let payload = response.json().await?;
        Ok(payload)
    }
}
