//! AdminGateway tests against a mock Admin API.
//!
//! Covers credential resolution from the store, raw body passthrough,
//! query flattening and the OAuth token exchange.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use secrecy::SecretString;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use burst_server::config::ShopifyAppConfig;
use burst_server::db::{InMemoryShopStore, ShopTokenStore};
use burst_server::shopify::{AdminGateway, ShopifyError};

const SHOP: &str = "a.myshopify.com";
const GRAPHQL_PATH: &str = "/admin/api/2024-07/graphql.json";

fn test_config() -> ShopifyAppConfig {
    ShopifyAppConfig {
        api_key: "key123".to_string(),
        api_secret: SecretString::from("secret456"),
        api_version: "2024-07".to_string(),
        scopes: "read_customers,write_customers".to_string(),
    }
}

async fn store_with_token(token: &str) -> Arc<InMemoryShopStore> {
    let store = Arc::new(InMemoryShopStore::new());
    store
        .insert(
            SHOP,
            &serde_json::json!({"access_token": token, "scope": "read_customers"}),
        )
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn dispatch_resolves_the_stored_credential() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("X-Shopify-Access-Token", "shpat_stored"))
        .and(header("user-agent", "Burst_Shopify_App"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"shop": {"name": "Test Shop"}},
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_with_token("shpat_stored").await;
    let gateway = AdminGateway::with_base_url(&test_config(), store, &mock_server.uri());

    let body = gateway
        .dispatch(SHOP, "{ shop { name } }", None, None)
        .await
        .unwrap();

    assert_eq!(body["data"]["shop"]["name"], "Test Shop");
}

#[tokio::test]
async fn dispatch_returns_graphql_errors_verbatim() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": null,
            "errors": [{"message": "Field 'companyContactProfiles' doesn't exist"}],
        })))
        .mount(&mock_server)
        .await;

    let store = store_with_token("shpat_stored").await;
    let gateway = AdminGateway::with_base_url(&test_config(), store, &mock_server.uri());

    // GraphQL errors inside a 200 body are the caller's to inspect, not a
    // dispatch failure.
    let body = gateway
        .dispatch(SHOP, "{ shop { name } }", None, None)
        .await
        .unwrap();

    assert_eq!(
        body["errors"][0]["message"],
        "Field 'companyContactProfiles' doesn't exist"
    );
}

#[tokio::test]
async fn dispatch_without_credential_fails_before_any_request() {
    let mock_server = MockServer::start().await;
    // No mocks mounted: a request would 404 and fail differently.

    let store = Arc::new(InMemoryShopStore::new());
    let gateway = AdminGateway::with_base_url(&test_config(), store, &mock_server.uri());

    let err = gateway
        .dispatch(SHOP, "{ shop { name } }", None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, ShopifyError::NoCredential(shop) if shop == SHOP));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn dispatch_flattens_multiline_queries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(body_string_contains("{  shop {    name  }}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_with_token("shpat_stored").await;
    let gateway = AdminGateway::with_base_url(&test_config(), store, &mock_server.uri());

    gateway
        .dispatch(SHOP, "{\n  shop {\n    name\n  }\n}", None, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn dispatch_prefers_an_explicit_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GRAPHQL_PATH))
        .and(header("X-Shopify-Access-Token", "shpat_fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Store holds a different token; the explicit one must win.
    let store = store_with_token("shpat_stored").await;
    let gateway = AdminGateway::with_base_url(&test_config(), store, &mock_server.uri());

    gateway
        .dispatch(SHOP, "{ app { handle } }", None, Some("shpat_fresh"))
        .await
        .unwrap();
}

#[tokio::test]
async fn exchange_code_posts_the_form_and_returns_the_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/admin/oauth/access_token"))
        .and(body_string_contains("client_id=key123"))
        .and(body_string_contains("client_secret=secret456"))
        .and(body_string_contains("code=authcode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "shpat_new",
            "scope": "read_customers,write_customers",
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryShopStore::new());
    let gateway = AdminGateway::with_base_url(&test_config(), store, &mock_server.uri());

    let token = gateway.exchange_code(SHOP, "authcode").await.unwrap();

    assert_eq!(token.access_token(), "shpat_new");
    assert_eq!(token.raw()["scope"], "read_customers,write_customers");
}

#[tokio::test]
async fn exchange_without_access_token_is_an_oauth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/admin/oauth/access_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"error": "invalid_request"})),
        )
        .mount(&mock_server)
        .await;

    let store = Arc::new(InMemoryShopStore::new());
    let gateway = AdminGateway::with_base_url(&test_config(), store, &mock_server.uri());

    let err = gateway.exchange_code(SHOP, "badcode").await.unwrap_err();
    assert!(matches!(err, ShopifyError::OAuth(_)));
}

#[test]
fn authorization_url_carries_key_scopes_and_callback() {
    let store: Arc<InMemoryShopStore> = Arc::new(InMemoryShopStore::new());
    let gateway = AdminGateway::new(&test_config(), store);

    let url = gateway.authorization_url(SHOP, "https://burst.example.com");

    assert!(url.starts_with("https://a.myshopify.com/admin/oauth/authorize?"));
    assert!(url.contains("client_id=key123"));
    assert!(url.contains("scope=read_customers%2Cwrite_customers"));
    assert!(url.contains("redirect_uri=https%3A%2F%2Fburst.example.com%2Fcallback"));
}
