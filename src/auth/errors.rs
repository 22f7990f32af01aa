//! Authentication error taxonomy.
//!
//! Every token-related kind renders the same externally; the distinction only
//! exists for logging.

use thiserror::Error;

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("malformed token")]
    Malformed,
    #[error("expired token")]
    Expired,
    #[error("revoked token")]
    Revoked,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. The two are never told apart.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("malformed token")]
    MalformedToken,
    #[error("expired token")]
    ExpiredToken,
    #[error("revoked token")]
    RevokedToken,
    #[error("missing token")]
    MissingToken,
    #[error("insufficient authority")]
    InsufficientAuthority,
    /// A collaborator (user store, revocation store) failed.
    #[error("auth backend unavailable: {0:#}")]
    Unavailable(#[from] anyhow::Error),
}

impl From<TokenRejection> for AuthError {
    fn from(rejection: TokenRejection) -> Self {
        match rejection {
            TokenRejection::Malformed => AuthError::MalformedToken,
            TokenRejection::Expired => AuthError::ExpiredToken,
            TokenRejection::Revoked => AuthError::RevokedToken,
        }
    }
}

impl AuthError {
    /// True for every kind that means "no usable identity on this request".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::MalformedToken
                | AuthError::ExpiredToken
                | AuthError::RevokedToken
                | AuthError::MissingToken
        )
    }
}
