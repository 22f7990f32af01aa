//! Todo-list backend - authentication service
//!
//! Loads configuration, opens the auth stores and serves the HTTP API.

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use todolist_auth::{
    app::{build_router, init_auth, spawn_rate_limit_cleanup, spawn_revocation_purge},
    config::Cli,
    middleware::{RateLimitConfig, RateLimitLayer},
};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Cli::parse().into_config()?;

    let auth_state = init_auth(&config)?;

    spawn_revocation_purge(
        auth_state.auth.tokens().clone(),
        config.revocation_purge_interval,
    );

    let limiter = RateLimitLayer::new(RateLimitConfig {
        max_requests: config.login_rate_limit,
        window: Duration::from_secs(60),
    });
    spawn_rate_limit_cleanup(limiter.clone(), Duration::from_secs(300));

    let app = build_router(auth_state, limiter);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("API server listening on {}", config.bind);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todolist_auth=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate's own .env when started from elsewhere
    let candidate = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if candidate.exists() {
        let _ = dotenv::from_path(&candidate);
    }
}
