//! App Bridge authenticated fetch endpoint.
//!
//! The embedded frontend calls `/index` with a session token bearer. The
//! response shape is fixed to `{"result": {"message": ..., "response": ...}}`
//! regardless of outcome, so errors are reported inside the envelope rather
//! than through `AppError`.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header::AUTHORIZATION};
use axum::http::HeaderMap;
use burst_core::{session_token_shop, verify_session_token};

use crate::state::AppState;

const UNMATCHED_MESSAGE: &str = "Signature unmatched. Incorrect authentication bearer sent";

fn envelope(message: &str, response: serde_json::Value) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "result": {
            "message": message,
            "response": response,
        }
    }))
}

/// Serve the stored shop record to an authenticated embedded frontend.
///
/// The shop is taken from the session token's `dest` claim, never from a
/// query parameter, so one shop cannot read another's record.
pub async fn authenticated_fetch(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return (
            StatusCode::BAD_REQUEST,
            envelope(UNMATCHED_MESSAGE, serde_json::Value::Null),
        );
    };

    let verified = matches!(
        verify_session_token(token, state.gateway().api_secret()),
        Ok((true, _))
    );
    let shop = session_token_shop(token);
    let (true, Some(shop)) = (verified, shop) else {
        return (
            StatusCode::BAD_REQUEST,
            envelope(UNMATCHED_MESSAGE, serde_json::Value::Null),
        );
    };

    match state.shops().get(&shop).await {
        Ok(Some(credential)) => (StatusCode::OK, envelope("", credential.redacted())),
        Ok(None) => (StatusCode::OK, envelope("", serde_json::Value::Null)),
        Err(err) => {
            tracing::error!(%shop, error = %err, "failed to load shop record");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                envelope(
                    "Internal error in retrieving shop data",
                    serde_json::Value::Null,
                ),
            )
        }
    }
}
