//! Burst Core - request verification and member-data resolution.
//!
//! This crate holds the pure parts of the Burst app:
//! - [`signature`] - HMAC verification for the three Shopify request origins
//!   (admin redirects, app proxies, and session-token bearer auth)
//! - [`member`] - the B2B member registration record and its field
//!   resolution rules
//! - [`geo`] - Japanese prefecture and phone-number helpers used when
//!   deriving member fields from Shopify address data
//!
//! No I/O, no database access, no HTTP clients.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod geo;
pub mod member;
pub mod signature;

pub use member::{CustomerProbe, MemberRegistration};
pub use signature::{
    SignatureError, session_token_shop, verify_admin_signature, verify_app_proxy_signature,
    verify_session_token,
};
