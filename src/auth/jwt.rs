//! JWT Token Service
//! Mission: Issue, validate and revoke signed access tokens
//!
//! A token is accepted iff its HS256 signature verifies, `exp` has not passed,
//! and its `jti` is not in the revocation store. Timestamps are unix seconds and
//! a token stops being accepted as soon as `now >= exp`. There is no clock-skew
//! leeway.

use crate::auth::{
    errors::TokenRejection,
    revocation::RevocationStore,
    roles::{active_authorities, Role, RoleKind},
};
use anyhow::{bail, Context, Result};
use axum::http::HeaderMap;
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,        // subject (user_id)
    pub roles: Vec<String>, // authority strings
    pub iat: i64,
    pub exp: i64,
    pub jti: String, // token id, key of the revocation store
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: String,
    pub subject: String,
    pub authorities: Vec<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl IssuedToken {
    pub fn expires_in(&self) -> i64 {
        self.expires_at - self.issued_at
    }
}

/// Identity carried by a token that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub roles: Vec<RoleKind>,
    pub token_id: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl VerifiedToken {
    pub fn has_authority(&self, role: RoleKind) -> bool {
        self.roles.contains(&role)
    }
}

/// What `invalidate` did with a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    Revoked,
    AlreadyRevoked,
    /// Past `exp` already; nothing to remember.
    AlreadyExpired,
    /// Not a token signed with our key.
    Unrecognized,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    // Same checks minus `exp`, used to read the jti of tokens being revoked
    revocation_validation: Validation,
    ttl_secs: i64,
    revoked: Arc<dyn RevocationStore>,
}

impl TokenService {
    /// Create a token service. An empty secret or zero TTL is a configuration error.
    pub fn new(secret: &str, ttl: Duration, revoked: Arc<dyn RevocationStore>) -> Result<Self> {
        if secret.is_empty() {
            bail!("JWT signing secret must not be empty");
        }
        let ttl_secs = i64::try_from(ttl.as_secs()).context("Token TTL out of range")?;
        if ttl_secs <= 0 {
            bail!("Token TTL must be at least one second");
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let mut revocation_validation = validation.clone();
        revocation_validation.validate_exp = false;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            revocation_validation,
            ttl_secs,
            revoked,
        })
    }

    /// Issue a token for `subject` carrying the authorities of its active roles.
    pub fn issue(&self, subject: &str, roles: &[Role]) -> Result<IssuedToken> {
        if subject.trim().is_empty() {
            bail!("Cannot issue a token without a subject");
        }

        let now = Utc::now();
        let expiration = now
            .checked_add_signed(chrono::Duration::seconds(self.ttl_secs))
            .context("Invalid timestamp")?;

        let claims = Claims {
            sub: subject.to_string(),
            roles: active_authorities(roles),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        debug!(
            subject = %claims.sub,
            roles = ?claims.roles,
            jti = %claims.jti,
            "Issuing access token, expires in {}s",
            self.ttl_secs
        );

        let token = self.sign(&claims)?;

        Ok(IssuedToken {
            token,
            token_id: claims.jti,
            subject: claims.sub,
            authorities: claims.roles,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    /// Sign `claims` as-is. Equal claims under the same key give equal tokens.
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .context("Failed to generate JWT")
    }

    /// Validate a token and extract the identity it carries.
    ///
    /// Never fails with anything but a [`TokenRejection`]; a revocation store
    /// error rejects the token.
    pub fn validate(&self, token: &str) -> Result<VerifiedToken, TokenRejection> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenRejection::Expired,
                _ => TokenRejection::Malformed,
            })?
            .claims;

        // jsonwebtoken only rejects `exp < now`; the second named by `exp` is already too late
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenRejection::Expired);
        }

        let verified = verified_from_claims(claims)?;

        match self.revoked.is_revoked(&verified.token_id) {
            Ok(false) => Ok(verified),
            Ok(true) => Err(TokenRejection::Revoked),
            Err(e) => {
                error!(jti = %verified.token_id, "Revocation lookup failed, rejecting token: {:#}", e);
                Err(TokenRejection::Revoked)
            }
        }
    }

    /// Revoke a token before its natural expiry.
    ///
    /// Idempotent, and a no-op for tokens that are expired or were not signed
    /// by this service. Only a revocation store failure is an error.
    pub fn invalidate(&self, token: &str) -> Result<Invalidation> {
        let claims = match decode::<Claims>(token, &self.decoding_key, &self.revocation_validation)
        {
            Ok(data) => data.claims,
            Err(_) => return Ok(Invalidation::Unrecognized),
        };
        let verified = match verified_from_claims(claims) {
            Ok(v) => v,
            Err(_) => return Ok(Invalidation::Unrecognized),
        };

        if verified.expires_at <= Utc::now().timestamp() {
            return Ok(Invalidation::AlreadyExpired);
        }

        let inserted = self
            .revoked
            .revoke(&verified.token_id, verified.expires_at)
            .context("Failed to revoke token")?;

        debug!(jti = %verified.token_id, subject = %verified.subject, inserted, "Token invalidated");

        Ok(if inserted {
            Invalidation::Revoked
        } else {
            Invalidation::AlreadyRevoked
        })
    }

    /// Drop revocation entries for tokens that have expired on their own.
    pub fn purge_expired_revocations(&self) -> Result<usize> {
        self.revoked.purge_expired(Utc::now().timestamp())
    }

    /// Read the bearer token from `Authorization: Bearer <token>`.
    pub fn extract_from_request(headers: &HeaderMap) -> Option<String> {
        headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| auth.token().trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Semantic checks on claims whose signature already verified.
fn verified_from_claims(claims: Claims) -> Result<VerifiedToken, TokenRejection> {
    if claims.sub.trim().is_empty() || claims.jti.trim().is_empty() || claims.exp < claims.iat {
        return Err(TokenRejection::Malformed);
    }

    let roles = claims
        .roles
        .iter()
        .map(|r| RoleKind::from_authority(r))
        .collect::<Option<Vec<_>>>()
        .ok_or(TokenRejection::Malformed)?;

    Ok(VerifiedToken {
        subject: claims.sub,
        roles,
        token_id: claims.jti,
        issued_at: claims.iat,
        expires_at: claims.exp,
    })
}
