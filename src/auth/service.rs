//! Auth Service
//! Mission: Turn credentials into tokens and tokens back into nothing

use crate::auth::{
    errors::AuthError,
    jwt::{Invalidation, IssuedToken, TokenService},
    models::Credentials,
    user_store::UserDirectory,
};
use anyhow::Context;
use axum::http::HeaderMap;
use bcrypt::verify;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{info, warn};

pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    tokens: Arc<TokenService>,
    // Verified against when the email is unknown or the input blank, so every
    // failure path costs a bcrypt run
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        tokens: Arc<TokenService>,
        hash_cost: u32,
    ) -> anyhow::Result<Self> {
        let dummy_hash = bcrypt::hash("not-a-real-password", hash_cost)
            .context("Failed to prepare credential check")?;
        Ok(Self {
            users,
            tokens,
            dummy_hash: dummy_hash.into(),
        })
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Verify credentials and issue a token carrying the user's active roles.
    pub async fn login(&self, credentials: &Credentials) -> Result<IssuedToken, AuthError> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            let _ = self
                .verify_password(&credentials.password, self.dummy_hash.clone())
                .await;
            warn!("Failed login attempt: blank credentials");
            return Err(AuthError::InvalidCredentials);
        }

        let user = self
            .users
            .find_by_email(&credentials.email)
            .await
            .map_err(AuthError::Unavailable)?;

        let Some(user) = user else {
            let _ = self
                .verify_password(&credentials.password, self.dummy_hash.clone())
                .await;
            warn!(email = %credentials.email, "Failed login attempt: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        match self
            .verify_password(&credentials.password, user.password_hash.as_str().into())
            .await?
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(email = %credentials.email, "Failed login attempt: wrong password");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                warn!(user_id = %user.id, "Stored password hash unusable: {}", e);
                return Err(AuthError::InvalidCredentials);
            }
        }

        let issued = self.tokens.issue(&user.id.to_string(), &user.roles)?;

        info!(
            user_id = %user.id,
            roles = ?issued.authorities,
            "Login successful"
        );

        Ok(issued)
    }

    /// Run bcrypt on the blocking pool. The outer error is a lost task, the
    /// inner one an unusable hash.
    async fn verify_password(
        &self,
        password: &str,
        hash: Arc<str>,
    ) -> Result<bcrypt::BcryptResult<bool>, AuthError> {
        let password = password.to_string();
        spawn_blocking(move || verify(password, &hash))
            .await
            .context("Password verification task failed")
            .map_err(AuthError::Unavailable)
    }

    /// Revoke `token`. Succeeds whatever state the token was in.
    pub fn logout(&self, token: &str) -> Result<Invalidation, AuthError> {
        let outcome = self.tokens.invalidate(token)?;
        info!(outcome = ?outcome, "Logout");
        Ok(outcome)
    }

    /// `None` means the request is anonymous, not that its token is bad.
    pub fn extract_token_from_request(&self, headers: &HeaderMap) -> Option<String> {
        TokenService::extract_from_request(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        errors::TokenRejection,
        models::User,
        revocation::MemoryRevocationStore,
        roles::{Role, RoleKind, RoleStatus},
    };
    use async_trait::async_trait;
    use axum::http::{header, HeaderValue};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use uuid::Uuid;

    /// In-memory stand-in for the user store
    #[derive(Default)]
    struct FakeDirectory {
        users: HashMap<String, User>,
    }

    impl FakeDirectory {
        fn with_user(mut self, email: &str, password: &str, roles: Vec<Role>) -> Self {
            let user = User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: bcrypt::hash(password, 4).unwrap(),
                roles,
                created_at: chrono::Utc::now().to_rfc3339(),
            };
            self.users.insert(email.to_string(), user);
            self
        }
    }

    #[async_trait]
    impl UserDirectory for FakeDirectory {
        async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
            Ok(self.users.get(email).cloned())
        }
    }

    struct BrokenDirectory;

    #[async_trait]
    impl UserDirectory for BrokenDirectory {
        async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
            anyhow::bail!("database is locked")
        }
    }

    fn create_service(directory: impl UserDirectory + 'static) -> AuthService {
        create_service_with_cost(directory, 4)
    }

    fn create_service_with_cost(directory: impl UserDirectory + 'static, cost: u32) -> AuthService {
        let tokens = TokenService::new(
            "test-secret-key-12345",
            Duration::from_secs(3600),
            Arc::new(MemoryRevocationStore::new()),
        )
        .unwrap();
        AuthService::new(Arc::new(directory), Arc::new(tokens), cost).unwrap()
    }

    /// Spawn a task that counts how often the runtime gets to poll it.
    fn spawn_ticker() -> (Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = tokio::spawn({
            let ticks = ticks.clone();
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            }
        });
        (ticks, handle)
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn active(kind: RoleKind) -> Role {
        Role::new(1, kind, RoleStatus::Active)
    }

    #[tokio::test]
    async fn test_login_then_validate() {
        let directory = FakeDirectory::default().with_user(
            "a@x.com",
            "correct-horse",
            vec![active(RoleKind::User)],
        );
        let user_id = directory.users["a@x.com"].id.to_string();
        let service = create_service(directory);

        let issued = service
            .login(&credentials("a@x.com", "correct-horse"))
            .await
            .unwrap();
        assert_eq!(issued.subject, user_id);

        let verified = service.tokens().validate(&issued.token).unwrap();
        assert_eq!(verified.subject, user_id);
        assert_eq!(verified.roles, vec![RoleKind::User]);
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let service = create_service(FakeDirectory::default().with_user(
            "a@x.com",
            "right",
            vec![active(RoleKind::User)],
        ));

        let result = service.login(&credentials("a@x.com", "wrong")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_unknown_email_is_invalid_credentials() {
        let service = create_service(FakeDirectory::default());

        let result = service.login(&credentials("nobody@x.com", "whatever")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));

        let result = service.login(&credentials("", "")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_password_checks_do_not_hold_the_runtime() {
        // Single-threaded runtime: the ticker only advances if login yields
        // while bcrypt runs
        let mut directory = FakeDirectory::default();
        directory.users.insert(
            "a@x.com".to_string(),
            User {
                id: Uuid::new_v4(),
                email: "a@x.com".to_string(),
                password_hash: bcrypt::hash("pw", 10).unwrap(),
                roles: vec![active(RoleKind::User)],
                created_at: String::new(),
            },
        );
        let service = create_service_with_cost(directory, 10);

        let attempts = [
            credentials("a@x.com", "pw"),
            credentials("a@x.com", "wrong"),
            credentials("nobody@x.com", "pw"),
            credentials("", ""),
        ];
        for attempt in &attempts {
            let (ticks, ticker) = spawn_ticker();
            let _ = service.login(attempt).await;
            let observed = ticks.load(Ordering::Relaxed);
            ticker.abort();
            assert!(observed > 0, "login for {:?} never yielded", attempt.email);
        }
    }

    #[tokio::test]
    async fn test_corrupt_stored_hash_fails_closed() {
        let mut directory = FakeDirectory::default();
        directory.users.insert(
            "a@x.com".to_string(),
            User {
                id: Uuid::new_v4(),
                email: "a@x.com".to_string(),
                password_hash: "not-bcrypt".to_string(),
                roles: vec![],
                created_at: String::new(),
            },
        );
        let service = create_service(directory);

        let result = service.login(&credentials("a@x.com", "not-bcrypt")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_store_failure_is_unavailable() {
        let service = create_service(BrokenDirectory);
        let result = service.login(&credentials("a@x.com", "pw")).await;
        assert!(matches!(result, Err(AuthError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_inactive_role_left_out_of_new_tokens() {
        let service = create_service(FakeDirectory::default().with_user(
            "a@x.com",
            "pw",
            vec![
                Role::new(1, RoleKind::Admin, RoleStatus::Inactive),
                active(RoleKind::User),
            ],
        ));

        let issued = service.login(&credentials("a@x.com", "pw")).await.unwrap();
        assert_eq!(issued.authorities, vec!["USER"]);
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let service = create_service(FakeDirectory::default().with_user(
            "a@x.com",
            "pw",
            vec![active(RoleKind::User)],
        ));
        let issued = service.login(&credentials("a@x.com", "pw")).await.unwrap();

        assert_eq!(service.logout(&issued.token).unwrap(), Invalidation::Revoked);
        assert_eq!(
            service.tokens().validate(&issued.token),
            Err(TokenRejection::Revoked)
        );
        assert_eq!(
            service.logout(&issued.token).unwrap(),
            Invalidation::AlreadyRevoked
        );
    }

    #[test]
    fn test_logout_of_never_issued_token_succeeds() {
        let service = create_service(FakeDirectory::default());
        assert_eq!(
            service.logout("eyJhbGciOiJIUzI1NiJ9.e30.forged").unwrap(),
            Invalidation::Unrecognized
        );
    }

    #[test]
    fn test_extract_token_absent_is_none() {
        let service = create_service(FakeDirectory::default());
        let mut headers = HeaderMap::new();
        assert_eq!(service.extract_token_from_request(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t0k"));
        assert_eq!(
            service.extract_token_from_request(&headers),
            Some("t0k".to_string())
        );
    }
}
