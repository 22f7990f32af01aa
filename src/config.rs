//! Application configuration
//!
//! Every flag falls back to an environment variable; `main` loads `.env`
//! files before parsing. The signing secret and token TTL have no defaults.

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

const RECOMMENDED_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RevocationBackend {
    /// Process-local; logouts are forgotten on restart
    Memory,
    /// Stored in the auth database next to the users
    Sqlite,
}

#[derive(Debug, Parser)]
#[command(name = "todolist-auth", about = "Todo-list backend authentication service")]
pub struct Cli {
    /// HMAC secret used to sign access tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "TOKEN_TTL_SECS")]
    pub token_ttl_secs: u64,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// SQLite database holding users, roles and (optionally) revoked tokens
    #[arg(long, env = "AUTH_DB_PATH", default_value = "todolist_auth.db")]
    pub database_path: String,

    #[arg(long, env = "REVOCATION_STORE", value_enum, default_value_t = RevocationBackend::Memory)]
    pub revocation_store: RevocationBackend,

    /// Seconds between purges of expired revocation entries
    #[arg(long, env = "REVOCATION_PURGE_SECS", default_value_t = 60)]
    pub revocation_purge_secs: u64,

    /// Login attempts allowed per client IP per minute
    #[arg(long, env = "LOGIN_RATE_LIMIT", default_value_t = 20)]
    pub login_rate_limit: u32,

    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Bootstrap administrator, created on startup if missing
    #[arg(long, env = "ADMIN_EMAIL", requires = "admin_password")]
    pub admin_email: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true, requires = "admin_email")]
    pub admin_password: Option<String>,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub bind: SocketAddr,
    pub database_path: String,
    pub revocation_store: RevocationBackend,
    pub revocation_purge_interval: Duration,
    pub login_rate_limit: u32,
    pub bcrypt_cost: u32,
    pub bootstrap_admin: Option<(String, String)>,
}

impl Cli {
    pub fn into_config(self) -> Result<AppConfig> {
        if self.jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET is set but empty; refusing to start without a signing key");
        }
        if self.jwt_secret.len() < RECOMMENDED_SECRET_LEN {
            warn!(
                "JWT secret is shorter than recommended ({} bytes)",
                RECOMMENDED_SECRET_LEN
            );
        }
        if self.token_ttl_secs == 0 {
            bail!("TOKEN_TTL_SECS must be greater than zero");
        }
        if self.revocation_purge_secs == 0 {
            bail!("REVOCATION_PURGE_SECS must be greater than zero");
        }
        if self.login_rate_limit == 0 {
            bail!("LOGIN_RATE_LIMIT must be greater than zero");
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }

        let bootstrap_admin = match (self.admin_email, self.admin_password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        Ok(AppConfig {
            jwt_secret: self.jwt_secret,
            token_ttl: Duration::from_secs(self.token_ttl_secs),
            bind: self.bind,
            database_path: self.database_path,
            revocation_store: self.revocation_store,
            revocation_purge_interval: Duration::from_secs(self.revocation_purge_secs),
            login_rate_limit: self.login_rate_limit,
            bcrypt_cost: self.bcrypt_cost,
            bootstrap_admin,
        })
    }
}
