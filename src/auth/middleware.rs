//! Authentication Middleware
//! Mission: Protect API endpoints with JWT validation and authority checks

use crate::auth::{
    access::{deny, AccessDenied},
    errors::AuthError,
    jwt::{TokenService, VerifiedToken},
    roles::RoleKind,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Auth middleware that validates bearer tokens.
///
/// On success the [`VerifiedToken`] is stored in the request extensions for
/// [`Principal`] and [`require_authority`] to read.
pub async fn auth_middleware(
    State(tokens): State<Arc<TokenService>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = TokenService::extract_from_request(req.headers()) else {
        return deny(&AuthError::MissingToken);
    };

    match tokens.validate(&token) {
        Ok(verified) => {
            req.extensions_mut().insert(verified);
            next.run(req).await
        }
        Err(rejection) => deny(&AuthError::from(rejection)),
    }
}

/// Route layer admitting only callers holding `required`.
///
/// Must sit inside [`auth_middleware`].
pub async fn require_authority(
    State(required): State<RoleKind>,
    req: Request,
    next: Next,
) -> Response {
    match req.extensions().get::<VerifiedToken>() {
        None => deny(&AuthError::MissingToken),
        Some(verified) if !verified.has_authority(required) => {
            deny(&AuthError::InsufficientAuthority)
        }
        Some(_) => next.run(req).await,
    }
}

/// The authenticated caller, as placed by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct Principal(pub VerifiedToken);

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AccessDenied;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedToken>()
            .cloned()
            .map(Principal)
            .ok_or(AccessDenied::Unauthenticated)
    }
}
