//! Storefront app proxy endpoint.
//!
//! Drives the member registration flow for a logged-in storefront customer.
//! Dispatches on the `action` query parameter: `register` shows the form
//! pre-filled from the customer probe, `submit` runs the registration chain,
//! anything else reports the login state as JSON.

use std::collections::BTreeMap;

use askama::Template;
use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use burst_core::{MemberRegistration, verify_app_proxy_signature};

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::workflow::{self, SubmitStatus};

/// Member registration form.
#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    shop_url: String,
    logout_url: String,
    member: MemberRegistration,
    status: Option<SubmitStatus>,
}

/// App proxy entry point.
pub async fn app_proxy(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Response> {
    if !verify_app_proxy_signature(&params, state.gateway().api_secret())? {
        return Err(AppError::BadRequest("signature mismatch".to_string()));
    }
    let shop = params
        .get("shop")
        .cloned()
        .ok_or_else(|| AppError::BadRequest("missing shop parameter".to_string()))?;

    let customer_id = params
        .get("logged_in_customer_id")
        .cloned()
        .unwrap_or_default();
    let action = params.get("action").cloned().unwrap_or_default();

    let probe = if customer_id.is_empty() {
        None
    } else {
        workflow::probe_customer(state.gateway(), &shop, &customer_id).await
    };

    match action.as_str() {
        "register" | "submit" => {
            let probe = probe.ok_or_else(|| {
                AppError::BadRequest("registration requires a logged-in customer".to_string())
            })?;
            let member = MemberRegistration::resolve(&params, &probe);

            let status = if action == "submit" {
                match workflow::run_submit(state.gateway(), &shop, &customer_id, &member, &probe)
                    .await
                {
                    Ok(()) => Some(SubmitStatus::success(&member.email)),
                    Err(err) => {
                        tracing::error!(%shop, error = %err, "registration submit failed");
                        Some(SubmitStatus::error(&err.to_string()))
                    }
                }
            } else {
                None
            };

            let template = RegisterTemplate {
                shop_url: format!("https://{shop}"),
                logout_url: format!("https://{shop}/customer_identity/logout"),
                member,
                status,
            };
            Ok(super::render(&template).into_response())
        }
        _ => {
            let (action, message) = if customer_id.is_empty() {
                ("login", "Not logged in")
            } else if probe.is_none() {
                ("login", "Retry to login")
            } else {
                ("register", "")
            };
            Ok(Json(serde_json::json!({
                "action": action,
                "array": [],
                "message": message,
            }))
            .into_response())
        }
    }
}
