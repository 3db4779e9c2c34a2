//! HMAC verification for the three Shopify request origins.
//!
//! Shopify signs requests with three distinct schemes depending on where the
//! request comes from, and the canonicalization rules differ subtly:
//!
//! - **Admin redirects** carry an `hmac` query parameter computed over the
//!   remaining parameters as sorted `key=value` pairs joined with `&`.
//! - **App-proxy requests** carry a `signature` parameter computed over the
//!   same sorted pairs joined with *no* separator at all.
//! - **Session tokens** (App Bridge authenticated fetch) are JWT-shaped
//!   `header.payload.signature` strings whose third segment is the
//!   base64url-encoded HMAC of the literal `header.payload` substring.
//!
//! The three verifiers are kept separate on purpose: collapsing them into one
//! generic check would hide the join-rule difference and silently break
//! verification for one origin or the other.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Reserved query key for admin-origin requests.
const ADMIN_SIGNATURE_KEY: &str = "hmac";

/// Reserved query key for app-proxy requests.
const PROXY_SIGNATURE_KEY: &str = "signature";

/// Errors from signature verification on malformed input.
///
/// A *well-formed* request with a wrong signature is not an error; the
/// verifier returns `Ok(false)` for it. These variants cover input that
/// cannot be checked at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The reserved signature parameter is absent.
    #[error("missing signature parameter `{0}`")]
    MissingSignature(&'static str),

    /// A session token did not have the `header.payload.signature` shape.
    #[error("malformed session token")]
    MalformedToken,
}

/// Verify the `hmac` parameter on an admin-origin request.
///
/// The signature is computed over every parameter *except* `hmac`, rendered
/// as `key=value`, lexicographically sorted, joined with `&`, HMAC-SHA256
/// keyed by the app secret and hex-encoded.
///
/// # Errors
///
/// Returns [`SignatureError::MissingSignature`] when `hmac` is absent.
pub fn verify_admin_signature(
    params: &BTreeMap<String, String>,
    secret: &str,
) -> Result<bool, SignatureError> {
    let provided = params
        .get(ADMIN_SIGNATURE_KEY)
        .ok_or(SignatureError::MissingSignature(ADMIN_SIGNATURE_KEY))?;

    let message = canonical_message(params, ADMIN_SIGNATURE_KEY, "&");
    Ok(hex_hmac(secret, &message) == *provided)
}

/// Verify the `signature` parameter on an app-proxy request.
///
/// Identical construction to [`verify_admin_signature`] except the reserved
/// key is `signature` and the sorted pairs are concatenated with no
/// separator. The difference is part of Shopify's wire contract.
///
/// # Errors
///
/// Returns [`SignatureError::MissingSignature`] when `signature` is absent.
pub fn verify_app_proxy_signature(
    params: &BTreeMap<String, String>,
    secret: &str,
) -> Result<bool, SignatureError> {
    let provided = params
        .get(PROXY_SIGNATURE_KEY)
        .ok_or(SignatureError::MissingSignature(PROXY_SIGNATURE_KEY))?;

    let message = canonical_message(params, PROXY_SIGNATURE_KEY, "");
    Ok(hex_hmac(secret, &message) == *provided)
}

/// Verify a session token from an App Bridge authenticated fetch.
///
/// Splits the token into `header.payload.signature`, HMACs the literal
/// `header.payload` substring and compares the base64url-encoded digest
/// (unpadded) against the third segment.
///
/// Returns the verification result together with the computed signature;
/// the latter is useful in diagnostics, never for trust decisions.
///
/// # Errors
///
/// Returns [`SignatureError::MalformedToken`] when the token does not have
/// exactly three dot-separated segments.
pub fn verify_session_token(token: &str, secret: &str) -> Result<(bool, String), SignatureError> {
    let (header, payload, provided) = split_token(token)?;

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return Ok((false, String::new()));
    };
    mac.update(format!("{header}.{payload}").as_bytes());
    let computed = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok((computed == provided, computed))
}

/// Extract the shop domain from a session token's `dest` claim.
///
/// The payload is decoded without signature validation; callers must have
/// already accepted the token via [`verify_session_token`].
#[must_use]
pub fn session_token_shop(token: &str) -> Option<String> {
    let (_, payload, _) = split_token(token).ok()?;
    let decoded = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    let dest = claims.get("dest")?.as_str()?;
    Some(dest.trim_start_matches("https://").to_string())
}

fn split_token(token: &str) -> Result<(&str, &str, &str), SignatureError> {
    let mut segments = token.split('.');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(payload), Some(signature), None) => Ok((header, payload, signature)),
        _ => Err(SignatureError::MalformedToken),
    }
}

/// Render the non-reserved parameters as sorted `key=value` pairs joined
/// with `separator`. `BTreeMap` iteration already yields lexicographic
/// key order.
fn canonical_message(
    params: &BTreeMap<String, String>,
    reserved_key: &str,
    separator: &str,
) -> String {
    params
        .iter()
        .filter(|(key, _)| key.as_str() != reserved_key)
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(separator)
}

fn hex_hmac(secret: &str, message: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
