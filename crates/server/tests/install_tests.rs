//! Install flow tests against a mock Admin API.
//!
//! Covers the entry-point decision between serving the embedded app and
//! starting OAuth, and the callback's exchange, persist and webhook
//! subscription side effects.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::header::{CONTENT_SECURITY_POLICY, LOCATION};
use axum::response::Response;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use sqlx::PgPool;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use burst_server::config::{ServerConfig, ShopifyAppConfig};
use burst_server::db::{InMemoryShopStore, ShopTokenStore};
use burst_server::error::AppError;
use burst_server::routes::install;
use burst_server::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const SHOP: &str = "a.myshopify.com";
const API_SECRET: &str = "secret456";
const APP_URL: &str = "https://burst.example.com";
const GRAPHQL_PATH: &str = "/admin/api/2024-07/graphql.json";

/// Query parameters with a valid admin `hmac` over the sorted pairs.
fn signed_params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut params: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();

    let message = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut mac = HmacSha256::new_from_slice(API_SECRET.as_bytes()).unwrap();
    mac.update(message.as_bytes());
    params.insert(
        "hmac".to_string(),
        hex::encode(mac.finalize().into_bytes()),
    );
    params
}

fn test_state(store: &Arc<InMemoryShopStore>, base_url: &str) -> AppState {
    let shopify = ShopifyAppConfig {
        api_key: "key123".to_string(),
        api_secret: SecretString::from(API_SECRET),
        api_version: "2024-07".to_string(),
        scopes: "read_customers,write_customers".to_string(),
    };
    let gateway = burst_server::shopify::AdminGateway::with_base_url(
        &shopify,
        Arc::clone(store) as Arc<dyn ShopTokenStore>,
        base_url,
    );
    let config = ServerConfig {
        database_url: SecretString::from("postgres://localhost/unused"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        app_url: APP_URL.to_string(),
        shopify,
        sentry_dsn: None,
    };
    // Handlers under test never touch the pool; a lazy one never connects.
    let pool = PgPool::connect_lazy("postgres://localhost/unused").unwrap();

    AppState::with_parts(
        config,
        pool,
        Arc::clone(store) as Arc<dyn ShopTokenStore>,
        gateway,
    )
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap()
}

#[tokio::test]
async fn unknown_shop_is_sent_to_oauth_authorization() {
    let mock_server = MockServer::start().await;
    // No mocks mounted: the entry point must not call the Admin API when
    // there is no stored credential to probe.

    let store = Arc::new(InMemoryShopStore::new());
    let state = test_state(&store, &mock_server.uri());

    let response = install::home(State(state), Query(signed_params(&[("shop", SHOP)])))
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let target = location(&response);
    assert!(target.starts_with("https://a.myshopify.com/admin/oauth/authorize?"));
    assert!(target.contains("client_id=key123"));
    assert!(target.contains("scope=read_customers%2Cwrite_customers"));
    assert!(target.contains("redirect_uri=https%3A%2F%2Fburst.example.com%2Fcallback"));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn dead_stored_token_restarts_the_install() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errors": [{"message": "Invalid API key or access token"}],
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryShopStore::new());
    store
        .insert(SHOP, &serde_json::json!({"access_token": "shpat_revoked"}))
        .await
        .unwrap();
    let state = test_state(&store, &mock_server.uri());

    let response = install::home(State(state), Query(signed_params(&[("shop", SHOP)])))
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert!(location(&response).starts_with("https://a.myshopify.com/admin/oauth/authorize?"));
}

#[tokio::test]
async fn live_token_serves_the_embedded_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("X-Shopify-Access-Token", "shpat_live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"shop": {"name": "Test Shop"}, "app": {"handle": "burst-app"}},
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryShopStore::new());
    store
        .insert(SHOP, &serde_json::json!({"access_token": "shpat_live"}))
        .await
        .unwrap();
    let state = test_state(&store, &mock_server.uri());

    let response = install::home(
        State(state),
        Query(signed_params(&[("shop", SHOP), ("embedded", "1")])),
    )
    .await
    .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(CONTENT_SECURITY_POLICY)
            .and_then(|v| v.to_str().ok()),
        Some("frame-ancestors https://a.myshopify.com https://admin.shopify.com;"),
    );
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(InMemoryShopStore::new());
    let state = test_state(&store, &mock_server.uri());

    let mut params = signed_params(&[("shop", SHOP)]);
    params.insert("shop".to_string(), "evil.myshopify.com".to_string());

    let err = install::home(State(state), Query(params)).await.unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn callback_persists_the_token_and_registers_the_webhook() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/admin/oauth/access_token"))
        .and(body_string_contains("client_id=key123"))
        .and(body_string_contains("code=authcode123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "shpat_new",
            "scope": "read_customers,write_customers",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("X-Shopify-Access-Token", "shpat_new"))
        .and(body_string_contains("webhookSubscriptionCreate"))
        .and(body_string_contains("ORDERS_FULFILLED"))
        .and(body_string_contains("https://burst.example.com/webhookshipping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"webhookSubscriptionCreate": {
                "userErrors": [],
                "webhookSubscription": {"id": "gid://shopify/WebhookSubscription/1"},
            }},
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("X-Shopify-Access-Token", "shpat_new"))
        .and(body_string_contains("{  app {    handle  }}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"app": {"handle": "burst-app"}},
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryShopStore::new());
    let state = test_state(&store, &mock_server.uri());

    let response = install::callback(
        State(state),
        Query(signed_params(&[("shop", SHOP), ("code", "authcode123")])),
    )
    .await
    .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(
        location(&response),
        "https://admin.shopify.com/store/a/apps/burst-app"
    );

    // The persist runs detached from the redirect; wait for it to land.
    let mut credential = None;
    for _ in 0..40 {
        if let Some(found) = store.get(SHOP).await.unwrap() {
            credential = Some(found);
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let credential = credential.expect("credential was never persisted");
    assert_eq!(credential.access_token(), Some("shpat_new"));
}
