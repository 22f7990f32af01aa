//! Authentication API Endpoints
//! Mission: Provide login, logout and user listing endpoints

use crate::auth::{
    errors::AuthError,
    middleware::Principal,
    models::{Credentials, LoginResponse, MeResponse, UserResponse},
    service::AuthService,
    user_store::SqliteUserStore,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub auth: Arc<AuthService>,
    pub user_store: Arc<SqliteUserStore>,
}

impl AuthState {
    pub fn new(auth: Arc<AuthService>, user_store: Arc<SqliteUserStore>) -> Self {
        Self { auth, user_store }
    }
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<Credentials>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    let issued = state.auth.login(&payload).await?;
    Ok(Json(LoginResponse::from_issued(&issued)))
}

/// Logout endpoint - POST /api/auth/logout
///
/// Answers 200 whether or not the presented token was still valid.
pub async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AuthApiError> {
    if let Some(token) = state.auth.extract_token_from_request(&headers) {
        state.auth.logout(&token)?;
    }
    Ok(Json(json!({ "status": "logged_out" })))
}

/// Get current user info - GET /api/auth/me
/// Built from the token alone, no database lookup
pub async fn get_current_user(Principal(me): Principal) -> Json<MeResponse> {
    Json(MeResponse {
        subject: me.subject,
        roles: me.roles,
        expires_at: me.expires_at,
    })
}

/// List all users - GET /api/admin/users (ADMIN authority, enforced by route layer)
pub async fn list_users(
    State(state): State<AuthState>,
) -> Result<Json<Vec<UserResponse>>, AuthApiError> {
    let users = state.user_store.list_users().map_err(|e| {
        error!("Failed to list users: {:#}", e);
        AuthApiError::InternalError
    })?;

    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidCredentials,
    InternalError,
}

impl From<AuthError> for AuthApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AuthApiError::InvalidCredentials,
            other => {
                error!("Auth request failed: {}", other);
                AuthApiError::InternalError
            }
        }
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid email or password",
            ),
            AuthApiError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
