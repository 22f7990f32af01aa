//! User Storage
//! Mission: Store user accounts and their role assignments with SQLite

use crate::auth::{
    models::User,
    roles::{Role, RoleKind, RoleStatus},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bcrypt::hash;
use chrono::Utc;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

/// Lookup the auth core needs from wherever users live.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The user registered under `email`, with every role assigned to it
    /// (active or not).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// User storage with SQLite backend
pub struct SqliteUserStore {
    db_path: String,
    hash_cost: u32,
}

impl SqliteUserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str, hash_cost: u32) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
            hash_cost,
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS roles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                role_enum TEXT UNIQUE NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_roles (
                user_id TEXT NOT NULL,
                role_id INTEGER NOT NULL,
                PRIMARY KEY (user_id, role_id),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (role_id) REFERENCES roles(id)
            )",
            [],
        )?;

        // The role set is closed, so every kind gets a row up front
        for kind in RoleKind::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO roles (role_enum, description, status)
                 VALUES (?1, ?2, ?3)",
                params![
                    kind.authority(),
                    kind.default_description(),
                    RoleStatus::Active.as_str()
                ],
            )
            .context("Failed to seed roles")?;
        }

        Ok(())
    }

    /// Create a new user holding `roles`
    pub fn create_user(&self, email: &str, password: &str, roles: &[RoleKind]) -> Result<User> {
        let email = normalize_email(email);
        let password_hash = hash(password, self.hash_cost).context("Failed to hash password")?;
        let id = Uuid::new_v4();
        let created_at = Utc::now().to_rfc3339();

        let mut conn = Connection::open(&self.db_path)?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), email, password_hash, created_at],
        )
        .context("Failed to insert user")?;
        for kind in roles {
            tx.execute(
                "INSERT OR IGNORE INTO user_roles (user_id, role_id)
                 SELECT ?1, id FROM roles WHERE role_enum = ?2",
                params![id.to_string(), kind.authority()],
            )
            .context("Failed to assign role")?;
        }
        tx.commit()?;

        let roles = load_roles(&conn, &id)?;
        info!(
            "Created user: {} ({:?})",
            email,
            roles.iter().map(|r| r.kind).collect::<Vec<_>>()
        );

        Ok(User {
            id,
            email,
            password_hash,
            roles,
            created_at,
        })
    }

    /// Create the bootstrap user unless the email is already registered.
    /// Returns whether a user was created.
    pub fn ensure_user(&self, email: &str, password: &str, roles: &[RoleKind]) -> Result<bool> {
        let conn = Connection::open(&self.db_path)?;
        if find_user(&conn, &normalize_email(email))?.is_some() {
            return Ok(false);
        }
        self.create_user(email, password, roles)?;
        Ok(true)
    }

    /// List all users (admin only)
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = Connection::open(&self.db_path)?;

        let mut stmt = conn.prepare(
            "SELECT id, email, password_hash, created_at FROM users ORDER BY created_at, email",
        )?;
        let mut users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for user in &mut users {
            user.roles = load_roles(&conn, &user.id)?;
        }

        Ok(users)
    }

    /// Activate or deactivate a role for every holder.
    pub fn set_role_status(&self, kind: RoleKind, status: RoleStatus) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        let rows = conn.execute(
            "UPDATE roles SET status = ?1 WHERE role_enum = ?2",
            params![status.as_str(), kind.authority()],
        )?;
        if rows == 0 {
            anyhow::bail!("Role {} not found", kind);
        }
        info!("Role {} is now {}", kind, status.as_str());
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let db_path = self.db_path.clone();
        let email = normalize_email(email);

        // rusqlite is blocking; keep it off the async workers
        tokio::task::spawn_blocking(move || -> Result<Option<User>> {
            let conn = Connection::open(&db_path)?;
            find_user(&conn, &email)
        })
        .await
        .context("User lookup task failed")?
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn find_user(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
            params![email],
            user_from_row,
        )
        .optional()?;

    match user {
        Some(mut user) => {
            user.roles = load_roles(conn, &user.id)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    Ok(User {
        id: Uuid::parse_str(&id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        roles: Vec::new(),
        created_at: row.get(3)?,
    })
}

fn load_roles(conn: &Connection, user_id: &Uuid) -> Result<Vec<Role>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.role_enum, r.description, r.status
         FROM roles r JOIN user_roles ur ON ur.role_id = r.id
         WHERE ur.user_id = ?1
         ORDER BY r.id",
    )?;

    let roles = stmt
        .query_map(params![user_id.to_string()], |row| {
            let role_enum: String = row.get(1)?;
            let status: String = row.get(3)?;
            Ok(Role {
                id: row.get(0)?,
                kind: RoleKind::from_authority(&role_enum)
                    .ok_or_else(|| unknown_value(1, "role", &role_enum))?,
                description: row.get(2)?,
                status: RoleStatus::from_str(&status)
                    .ok_or_else(|| unknown_value(3, "role status", &status))?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to load user roles")?;

    Ok(roles)
}

fn unknown_value(column: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        format!("unknown {}: {}", what, value).into(),
    )
}
