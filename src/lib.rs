//! Todo-list backend authentication library
//!
//! Exposes the auth core (tokens, revocation, roles, access decisions) and the
//! axum wiring used by the server binary and the integration tests.

pub mod app;
pub mod auth;
pub mod config;
pub mod middleware;
