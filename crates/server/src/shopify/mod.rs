//! Shopify Admin API gateway.
//!
//! Unlike a typed client, [`AdminGateway`] forwards raw GraphQL documents
//! and hands the response body back as JSON. GraphQL-level `errors` are the
//! caller's business: the proxy route relays them to the storefront, and the
//! install probe treats a missing field as an invalid token.

mod gateway;

pub use gateway::{AdminGateway, ExchangedToken, GraphQLRequest};

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur when talking to the Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// No stored access token for the shop.
    #[error("No credential stored for shop {0}")]
    NoCredential(String),

    /// Credential lookup failed.
    #[error("Credential store error: {0}")]
    Store(#[from] RepositoryError),

    /// OAuth token exchange failed.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}
