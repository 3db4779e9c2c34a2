//! Install flow: app entry point and OAuth callback.

use std::collections::BTreeMap;

use askama::Template;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_SECURITY_POLICY;
use axum::response::{IntoResponse, Redirect, Response};
use burst_core::verify_admin_signature;

use crate::error::{AppError, Result};
use crate::state::AppState;

const SHOP_PROBE: &str = r"{
  shop {
    name
  }
  app {
    handle
  }
}";

const APP_HANDLE_PROBE: &str = r"{
  app {
    handle
  }
}";

const WEBHOOK_SUBSCRIPTION_CREATE: &str =
    r"mutation webhookSubscriptionCreate($topic: WebhookSubscriptionTopic!, $webhookSubscription: WebhookSubscriptionInput!) {
  webhookSubscriptionCreate(topic: $topic, webhookSubscription: $webhookSubscription) {
    userErrors {
      field
      message
    }
    webhookSubscription {
      id
      endpoint
      format
      includeFields
      topic
    }
  }
}";

/// App landing page, shown embedded inside Shopify admin.
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {}

/// App entry point.
///
/// Verifies the admin signature, then decides between serving the embedded
/// app and starting the OAuth install. Install is needed when no credential
/// is stored or when a probe shows the stored token no longer works (the
/// merchant may have uninstalled and reinstalled the app).
pub async fn home(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Response> {
    if !verify_admin_signature(&params, state.gateway().api_secret())? {
        return Err(AppError::BadRequest("signature mismatch".to_string()));
    }
    let shop = require_shop(&params)?;

    let install = match state.shops().get(shop).await? {
        None => {
            tracing::info!(%shop, "no stored credential, starting install");
            true
        }
        Some(_) => !stored_token_is_live(&state, shop).await,
    };

    if install {
        let url = state
            .gateway()
            .authorization_url(shop, &state.config().app_url);
        tracing::info!(%shop, "redirecting to OAuth authorization");
        return Ok(Redirect::to(&url).into_response());
    }

    let embedded = params.get("embedded").is_some_and(|v| v == "1");
    let mut response = super::render(&IndexTemplate {}).into_response();
    response.headers_mut().insert(
        CONTENT_SECURITY_POLICY,
        content_security_policy(embedded, shop)
            .parse()
            .map_err(|_| AppError::Internal("invalid CSP header".to_string()))?,
    );
    Ok(response)
}

/// OAuth callback: exchange the code, persist the credential and bounce the
/// merchant back into Shopify admin.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Response> {
    if !verify_admin_signature(&params, state.gateway().api_secret())? {
        return Err(AppError::BadRequest("signature mismatch".to_string()));
    }
    let shop = require_shop(&params)?;
    let code = params
        .get("code")
        .ok_or_else(|| AppError::BadRequest("missing code parameter".to_string()))?;

    let token = state.gateway().exchange_code(shop, code).await?;

    // Persisting must not delay the redirect; a failed write surfaces on the
    // next entry as a fresh install.
    {
        let shops = state.shops().clone();
        let shop = shop.to_string();
        let payload = token.raw().clone();
        tokio::spawn(async move {
            if let Err(err) = shops.save(&shop, &payload).await {
                tracing::error!(%shop, error = %err, "failed to persist shop credential");
            }
        });
    }

    // The token is passed explicitly: the spawned write may not have landed.
    let probe = state
        .gateway()
        .dispatch(shop, APP_HANDLE_PROBE, None, Some(token.access_token()))
        .await;

    subscribe_fulfillment_webhook(&state, shop, token.access_token()).await;

    let handle = probe
        .ok()
        .and_then(|body| {
            body.pointer("/data/app/handle")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .ok_or_else(|| AppError::Internal("app handle probe failed".to_string()))?;

    let url = format!(
        "https://admin.shopify.com/store/{}/apps/{handle}",
        shop.replace(".myshopify.com", "")
    );
    Ok(Redirect::to(&url).into_response())
}

fn require_shop(params: &BTreeMap<String, String>) -> Result<&str> {
    params
        .get("shop")
        .map(String::as_str)
        .ok_or_else(|| AppError::BadRequest("missing shop parameter".to_string()))
}

/// Probe the Admin API with the stored token. Any transport failure or a
/// response without the shop name means the token is dead.
async fn stored_token_is_live(state: &AppState, shop: &str) -> bool {
    match state.gateway().dispatch(shop, SHOP_PROBE, None, None).await {
        Ok(body) => body
            .pointer("/data/shop/name")
            .is_some_and(serde_json::Value::is_string),
        Err(err) => {
            tracing::info!(%shop, error = %err, "stored token probe failed");
            false
        }
    }
}

/// Subscribe to order fulfillment webhooks. Best-effort: a duplicate
/// subscription error on reinstall is expected and only logged.
async fn subscribe_fulfillment_webhook(state: &AppState, shop: &str, token: &str) {
    let variables = serde_json::json!({
        "topic": "ORDERS_FULFILLED",
        "webhookSubscription": {
            "callbackUrl": format!("{}/webhookshipping", state.config().app_url),
            "format": "JSON",
        },
    });

    if let Err(err) = state
        .gateway()
        .dispatch(shop, WEBHOOK_SUBSCRIPTION_CREATE, Some(variables), Some(token))
        .await
    {
        tracing::warn!(%shop, error = %err, "webhook subscription failed");
    }
}

/// Frame-ancestors policy for the embedded admin page. Outside the admin
/// iframe the page must not be frameable at all.
fn content_security_policy(embedded: bool, shop: &str) -> String {
    if embedded {
        format!("frame-ancestors https://{shop} https://admin.shopify.com;")
    } else {
        "frame-ancestors 'none';".to_string()
    }
}
