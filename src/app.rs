//! Service wiring: stores, auth services and the HTTP router.

use crate::auth::{
    api as auth_api, auth_middleware, require_authority, AuthService, AuthState,
    MemoryRevocationStore, RevocationStore, RoleKind, SqliteRevocationStore, SqliteUserStore,
    TokenService,
};
use crate::config::{AppConfig, RevocationBackend};
use crate::middleware::{rate_limit_middleware, request_logging, RateLimitLayer};
use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::{task::JoinHandle, time::interval};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Open the stores and build the auth services described by `config`.
pub fn init_auth(config: &AppConfig) -> Result<AuthState> {
    let user_store = Arc::new(
        SqliteUserStore::new(&config.database_path, config.bcrypt_cost)
            .context("Failed to open user store")?,
    );

    if let Some((email, password)) = &config.bootstrap_admin {
        if user_store.ensure_user(email, password, &[RoleKind::Admin, RoleKind::User])? {
            info!("Bootstrap admin created: {}", email);
        }
    }

    let revoked: Arc<dyn RevocationStore> = match config.revocation_store {
        RevocationBackend::Memory => Arc::new(MemoryRevocationStore::new()),
        RevocationBackend::Sqlite => Arc::new(
            SqliteRevocationStore::new(&config.database_path)
                .context("Failed to open revocation store")?,
        ),
    };

    let tokens = Arc::new(TokenService::new(
        &config.jwt_secret,
        config.token_ttl,
        revoked,
    )?);
    let auth = Arc::new(AuthService::new(
        user_store.clone(),
        tokens,
        config.bcrypt_cost,
    )?);

    info!(
        "Authentication initialized at: {} (revocations: {:?}, token ttl: {}s)",
        config.database_path,
        config.revocation_store,
        config.token_ttl.as_secs()
    );

    Ok(AuthState::new(auth, user_store))
}

/// Build the full application router.
///
/// `limiter` guards the login route only; keep a clone to run
/// [`spawn_rate_limit_cleanup`] against.
pub fn build_router(state: AuthState, limiter: RateLimitLayer) -> Router {
    let tokens = state.auth.tokens().clone();

    let login_routes = Router::new()
        .route("/api/auth/login", post(auth_api::login))
        .route_layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ));

    let admin_routes = Router::new()
        .route("/api/admin/users", get(auth_api::list_users))
        .route_layer(middleware::from_fn_with_state(
            RoleKind::Admin,
            require_authority,
        ));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth_api::get_current_user))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(tokens, auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/logout", post(auth_api::logout))
        .merge(login_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive())
}

async fn health_check() -> &'static str {
    "ok"
}

/// Periodically drop revocation entries whose tokens have expired anyway.
pub fn spawn_revocation_purge(tokens: Arc<TokenService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            match tokens.purge_expired_revocations() {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Purged expired revocations"),
                Err(e) => error!("Revocation purge failed: {:#}", e),
            }
        }
    })
}

/// Periodically forget idle rate-limit buckets.
pub fn spawn_rate_limit_cleanup(limiter: RateLimitLayer, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            limiter.cleanup();
        }
    })
}
