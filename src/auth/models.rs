//! Authentication Models
//! Mission: Define user and authentication data structures

use crate::auth::{jwt::IssuedToken, roles::Role, roles::RoleKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account as held by the user store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub roles: Vec<Role>,
    pub created_at: String,
}

/// Login request body. Never stored.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64, // seconds until expiration
    pub expires_at: i64,
    pub roles: Vec<String>,
}

impl LoginResponse {
    pub fn from_issued(issued: &IssuedToken) -> Self {
        Self {
            token: issued.token.clone(),
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in(),
            expires_at: issued.expires_at,
            roles: issued.authorities.clone(),
        }
    }
}

/// Identity of the caller, read back from its token
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub subject: String,
    pub roles: Vec<RoleKind>,
    pub expires_at: i64,
}

/// User response (sanitized)
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub roles: Vec<RoleKind>,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            roles: user.roles.iter().map(|r| r.kind).collect(),
            created_at: user.created_at.clone(),
        }
    }
}
