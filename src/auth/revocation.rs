//! Revoked Token Storage
//! Mission: Remember logged-out tokens until they would have expired anyway
//!
//! Only the token id (`jti`) and its original `exp` are kept. Once `now`
//! reaches `exp` the token is rejected as expired on its own, so the entry can
//! be purged.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use tracing::debug;

/// Storage for revoked token ids.
///
/// `revoke` must be an atomic insert-if-absent: concurrent callers revoking
/// the same id see exactly one `true`.
pub trait RevocationStore: Send + Sync {
    /// Records `jti` as revoked until `expires_at` (unix seconds).
    /// Returns `false` if it was already recorded.
    fn revoke(&self, jti: &str, expires_at: i64) -> Result<bool>;

    fn is_revoked(&self, jti: &str) -> Result<bool>;

    /// Drops every entry whose `expires_at` is at or before `now`.
    /// Returns the number of entries removed.
    fn purge_expired(&self, now: i64) -> Result<usize>;
}

/// Process-local revocation list.
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: RwLock<HashMap<String, i64>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl RevocationStore for MemoryRevocationStore {
    fn revoke(&self, jti: &str, expires_at: i64) -> Result<bool> {
        let mut entries = self.entries.write();
        if entries.contains_key(jti) {
            return Ok(false);
        }
        entries.insert(jti.to_string(), expires_at);
        Ok(true)
    }

    fn is_revoked(&self, jti: &str) -> Result<bool> {
        Ok(self.entries.read().contains_key(jti))
    }

    fn purge_expired(&self, now: i64) -> Result<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        Ok(before - entries.len())
    }
}

/// Revocation list persisted next to the user tables, so logouts survive a
/// restart.
pub struct SqliteRevocationStore {
    db_path: String,
}

impl SqliteRevocationStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS revoked_tokens (
                jti TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL
            )",
            [],
        )
        .context("Failed to create revoked_tokens table")?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_revoked_tokens_expires_at
             ON revoked_tokens (expires_at)",
            [],
        )?;
        Ok(())
    }
}

impl RevocationStore for SqliteRevocationStore {
    fn revoke(&self, jti: &str, expires_at: i64) -> Result<bool> {
        let conn = Connection::open(&self.db_path)?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO revoked_tokens (jti, expires_at) VALUES (?1, ?2)",
                params![jti, expires_at],
            )
            .context("Failed to record revoked token")?;
        Ok(inserted == 1)
    }

    fn is_revoked(&self, jti: &str) -> Result<bool> {
        let conn = Connection::open(&self.db_path)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM revoked_tokens WHERE jti = ?1",
                params![jti],
                |row| row.get(0),
            )
            .context("Failed to look up revoked token")?;
        Ok(count > 0)
    }

    fn purge_expired(&self, now: i64) -> Result<usize> {
        let conn = Connection::open(&self.db_path)?;
        let removed = conn
            .execute(
                "DELETE FROM revoked_tokens WHERE expires_at <= ?1",
                params![now],
            )
            .context("Failed to purge revoked tokens")?;
        if removed > 0 {
            debug!(removed, "Purged expired revocation entries");
        }
        Ok(removed)
    }
}
