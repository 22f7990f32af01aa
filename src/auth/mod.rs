//! Authentication Module
//! Mission: Secure API access with JWT tokens, revocation and role-based authorization

pub mod access;
pub mod api;
pub mod errors;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod revocation;
pub mod roles;
pub mod service;
pub mod user_store;

pub use access::AccessDenied;
pub use api::AuthState;
pub use errors::{AuthError, TokenRejection};
pub use jwt::{Invalidation, IssuedToken, TokenService, VerifiedToken};
pub use middleware::{auth_middleware, require_authority, Principal};
pub use revocation::{MemoryRevocationStore, RevocationStore, SqliteRevocationStore};
pub use roles::{Role, RoleKind, RoleStatus};
pub use service::AuthService;
pub use user_store::{SqliteUserStore, UserDirectory};
