//! Burst server library.
//!
//! Exposes the app as a library so route handlers, the GraphQL gateway and
//! the registration workflow can be exercised from integration tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod shopify;
pub mod state;
pub mod workflow;
