//! HTTP routes.
//!
//! Four public endpoints, each authenticated by the signature scheme that
//! matches its caller:
//!
//! - `/` and `/callback` - install flow, admin `hmac` parameter
//! - `/index` - App Bridge authenticated fetch, session token bearer
//! - `/appproxy` - storefront app proxy, `signature` parameter

use askama::Template;
use axum::response::Html;
use axum::{Router, routing::get};

use crate::state::AppState;

pub mod install;
pub mod proxy;
pub mod session;

/// Build the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(install::home))
        .route("/callback", get(install::callback))
        .route("/index", get(session::authenticated_fetch))
        .route("/appproxy", get(proxy::app_proxy))
}

/// Render a template, logging failures and serving an empty body rather
/// than a broken page.
fn render<T: Template>(template: &T) -> Html<String> {
    Html(template.render().unwrap_or_else(|err| {
        tracing::error!(error = %err, "Template render failed");
        String::new()
    }))
}
