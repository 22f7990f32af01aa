//! Access Decision Handler
//! Mission: Give every denied request the same, uninformative answer

use crate::auth::errors::AuthError;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    /// No usable identity: missing, malformed, expired or revoked token.
    Unauthenticated,
    /// Authenticated, but without the authority the resource requires.
    InsufficientAuthority,
}

#[derive(Serialize)]
struct DenialBody {
    error: &'static str,
    message: &'static str,
}

impl AccessDenied {
    pub fn status(&self) -> StatusCode {
        match self {
            AccessDenied::Unauthenticated => StatusCode::UNAUTHORIZED,
            AccessDenied::InsufficientAuthority => StatusCode::FORBIDDEN,
        }
    }

    /// Stable machine-readable code carried in the body.
    pub fn code(&self) -> &'static str {
        match self {
            AccessDenied::Unauthenticated => "unauthorized",
            AccessDenied::InsufficientAuthority => "forbidden",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AccessDenied::Unauthenticated => {
                "Full authentication is required to access this resource"
            }
            AccessDenied::InsufficientAuthority => "Access is denied",
        }
    }

    /// Classify an auth failure. Collaborator failures are not denials and
    /// yield `None`.
    pub fn from_error(err: &AuthError) -> Option<Self> {
        match err {
            AuthError::InsufficientAuthority => Some(AccessDenied::InsufficientAuthority),
            e if e.is_unauthenticated() => Some(AccessDenied::Unauthenticated),
            _ => None,
        }
    }
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = DenialBody {
            error: self.code(),
            message: self.message(),
        };

        // A denial must not turn into a 500; fall back to a bare status
        let bytes = match serde_json::to_vec(&body) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode denial body: {}", e);
                return status.into_response();
            }
        };

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Log the internal reason, then answer with the uniform denial.
pub fn deny(err: &AuthError) -> Response {
    match AccessDenied::from_error(err) {
        Some(denied) => {
            warn!(reason = %err, "Access denied");
            denied.into_response()
        }
        None => {
            error!("Auth backend failure: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
