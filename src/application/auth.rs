use crate::domain::models::Session;
use crate::infrastructure::auth_client::{
    AuthHttpClient, MagicLinkRequest, PasswordGrantRequest, RefreshGrantRequest, SessionResponse,
    SignOutRequest, SignUpRequest,
};
use crate::infrastructure::config::StoreConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::session_store::SessionStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

const SESSION_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub auth_endpoint: String,
    pub anon_key: String,
}

impl AuthConfig {
    pub fn from_store_config(config: &StoreConfig) -> Self {
        Self {
            auth_endpoint: config.auth_endpoint(),
            anon_key: config.anon_key.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureSessionResult {
    Existing(Session),
    Refreshed(Session),
    SignInRequired,
}

/// Outcome of an interactive auth action, shaped for the UI to branch on
/// directly instead of inspecting error strings.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthOutcome {
    SignedIn {
        user_id: String,
        email: Option<String>,
        expires_at: String,
    },
    AccountCreated,
    MagicLinkSent,
    Failed {
        reason: String,
    },
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct AuthManager<S, C>
where
    S: SessionStore,
    C: AuthHttpClient,
{
    config: AuthConfig,
    session_store: Arc<S>,
    auth_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> AuthManager<S, C>
where
    S: SessionStore,
    C: AuthHttpClient,
{
    pub fn new(config: AuthConfig, session_store: Arc<S>, auth_client: Arc<C>) -> Self {
        Self {
            config,
            session_store,
            auth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn is_session_valid(&self, session: &Session) -> bool {
        session.is_valid_at((self.now_provider)(), SESSION_LEEWAY_SECONDS)
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthOutcome, InfraError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Ok(AuthOutcome::Failed {
                reason: "email and password are required".to_string(),
            });
        }

        let response = self
            .auth_client
            .sign_in_with_password(PasswordGrantRequest {
                auth_endpoint: self.config.auth_endpoint.clone(),
                anon_key: self.config.anon_key.clone(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await;

        match response {
            Ok(response) => {
                let session = self.session_from_response(response, None);
                self.session_store.save_session(&session)?;
                Ok(signed_in_outcome(&session))
            }
            Err(InfraError::Auth(reason)) => Ok(AuthOutcome::Failed { reason }),
            Err(error) => Err(error),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthOutcome, InfraError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Ok(AuthOutcome::Failed {
                reason: "email and password are required".to_string(),
            });
        }

        let response = self
            .auth_client
            .sign_up(SignUpRequest {
                auth_endpoint: self.config.auth_endpoint.clone(),
                anon_key: self.config.anon_key.clone(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await;

        match response {
            Ok(response) => match response.session {
                Some(session_response) => {
                    let session = self.session_from_response(session_response, None);
                    self.session_store.save_session(&session)?;
                    Ok(signed_in_outcome(&session))
                }
                None => Ok(AuthOutcome::AccountCreated),
            },
            Err(InfraError::Auth(reason)) => Ok(AuthOutcome::Failed { reason }),
            Err(error) => Err(error),
        }
    }

    pub async fn send_magic_link(&self, email: &str) -> Result<AuthOutcome, InfraError> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(AuthOutcome::Failed {
                reason: "email is required".to_string(),
            });
        }

        let response = self
            .auth_client
            .send_magic_link(MagicLinkRequest {
                auth_endpoint: self.config.auth_endpoint.clone(),
                anon_key: self.config.anon_key.clone(),
                email: email.to_string(),
            })
            .await;

        match response {
            Ok(()) => Ok(AuthOutcome::MagicLinkSent),
            Err(InfraError::Auth(reason)) => Ok(AuthOutcome::Failed { reason }),
            Err(error) => Err(error),
        }
    }

    /// Return a usable session, refreshing through the auth provider when the
    /// stored one has expired.
    pub async fn ensure_session(&self) -> Result<EnsureSessionResult, InfraError> {
        let Some(stored) = self.session_store.load_session()? else {
            return Ok(EnsureSessionResult::SignInRequired);
        };

        if self.is_session_valid(&stored) {
            return Ok(EnsureSessionResult::Existing(stored));
        }

        if let Some(refresh_token) = stored.refresh_token.clone() {
            let refreshed = self
                .auth_client
                .refresh_session(RefreshGrantRequest {
                    auth_endpoint: self.config.auth_endpoint.clone(),
                    anon_key: self.config.anon_key.clone(),
                    refresh_token,
                })
                .await;

            match refreshed {
                Ok(response) => {
                    let session =
                        self.session_from_response(response, stored.refresh_token.clone());
                    self.session_store.save_session(&session)?;
                    Ok(EnsureSessionResult::Refreshed(session))
                }
                Err(InfraError::Auth(_)) => Ok(EnsureSessionResult::SignInRequired),
                Err(error) => Err(error),
            }
        } else {
            Ok(EnsureSessionResult::SignInRequired)
        }
    }

    /// End the session locally regardless of whether the provider-side
    /// revocation succeeds.
    pub async fn sign_out(&self) -> Result<(), InfraError> {
        if let Some(session) = self.session_store.load_session()? {
            let revoked = self
                .auth_client
                .sign_out(SignOutRequest {
                    auth_endpoint: self.config.auth_endpoint.clone(),
                    anon_key: self.config.anon_key.clone(),
                    access_token: session.access_token,
                })
                .await;
            if let Err(error) = revoked {
                match error {
                    InfraError::Auth(_) => {}
                    other => return Err(other),
                }
            }
        }
        self.session_store.delete_session()
    }

    pub fn stored_session(&self) -> Result<Option<Session>, InfraError> {
        self.session_store.load_session()
    }

    fn session_from_response(
        &self,
        response: SessionResponse,
        fallback_refresh_token: Option<String>,
    ) -> Session {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        Session {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh_token),
            expires_at,
            user_id: response.user_id,
            email: response.email,
        }
    }
}

fn signed_in_outcome(session: &Session) -> AuthOutcome {
    AuthOutcome::SignedIn {
        user_id: session.user_id.clone(),
        email: session.email.clone(),
        expires_at: session.expires_at.to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::auth_client::SignUpResponse;
    use crate::infrastructure::session_store::InMemorySessionStore;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum FakeResponse {
        Success(SessionResponse),
        AuthError(String),
    }

    impl Default for FakeResponse {
        fn default() -> Self {
            Self::Success(SessionResponse {
                access_token: "fake_access".to_string(),
                refresh_token: Some("fake_refresh".to_string()),
                expires_in: 3600,
                user_id: "user-1".to_string(),
                email: Some("person@example.com".to_string()),
            })
        }
    }

    #[derive(Debug, Default)]
    struct FakeAuthClient {
        password_response: Mutex<FakeResponse>,
        refresh_response: Mutex<FakeResponse>,
        sign_up_confirmation_required: Mutex<bool>,
        magic_link_error: Mutex<Option<String>>,
        password_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        sign_out_calls: AtomicUsize,
    }

    impl FakeAuthClient {
        fn set_password_response(&self, response: FakeResponse) {
            *self.password_response.lock().expect("password mutex poisoned") = response;
        }

        fn set_refresh_response(&self, response: FakeResponse) {
            *self.refresh_response.lock().expect("refresh mutex poisoned") = response;
        }

        fn require_sign_up_confirmation(&self) {
            *self
                .sign_up_confirmation_required
                .lock()
                .expect("sign up mutex poisoned") = true;
        }
    }

    #[async_trait]
    impl AuthHttpClient for FakeAuthClient {
        async fn sign_in_with_password(
            &self,
            _request: PasswordGrantRequest,
        ) -> Result<SessionResponse, InfraError> {
            self.password_calls.fetch_add(1, Ordering::SeqCst);
            match self
                .password_response
                .lock()
                .expect("password mutex poisoned")
                .clone()
            {
                FakeResponse::Success(value) => Ok(value),
                FakeResponse::AuthError(message) => Err(InfraError::Auth(message)),
            }
        }

        async fn refresh_session(
            &self,
            _request: RefreshGrantRequest,
        ) -> Result<SessionResponse, InfraError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            match self
                .refresh_response
                .lock()
                .expect("refresh mutex poisoned")
                .clone()
            {
                FakeResponse::Success(value) => Ok(value),
                FakeResponse::AuthError(message) => Err(InfraError::Auth(message)),
            }
        }

        async fn sign_up(&self, _request: SignUpRequest) -> Result<SignUpResponse, InfraError> {
            let confirmation = *self
                .sign_up_confirmation_required
                .lock()
                .expect("sign up mutex poisoned");
            if confirmation {
                return Ok(SignUpResponse { session: None });
            }
            match self
                .password_response
                .lock()
                .expect("password mutex poisoned")
                .clone()
            {
                FakeResponse::Success(value) => Ok(SignUpResponse {
                    session: Some(value),
                }),
                FakeResponse::AuthError(message) => Err(InfraError::Auth(message)),
            }
        }

        async fn send_magic_link(&self, _request: MagicLinkRequest) -> Result<(), InfraError> {
            match self
                .magic_link_error
                .lock()
                .expect("magic link mutex poisoned")
                .clone()
            {
                None => Ok(()),
                Some(message) => Err(InfraError::Auth(message)),
            }
        }

        async fn sign_out(&self, _request: SignOutRequest) -> Result<(), InfraError> {
            self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config() -> AuthConfig {
        AuthConfig {
            auth_endpoint: "https://example.supabase.co/auth/v1".to_string(),
            anon_key: "anon-key".to_string(),
        }
    }

    fn manager(
        store: Arc<InMemorySessionStore>,
        client: Arc<FakeAuthClient>,
    ) -> AuthManager<InMemorySessionStore, FakeAuthClient> {
        AuthManager::new(test_config(), store, client)
    }

    fn token_pattern() -> impl Strategy<Value = String> {
        "[A-Za-z0-9._\\-]{1,64}".prop_map(|value| value.to_string())
    }

    fn arb_session() -> impl Strategy<Value = Session> {
        (
            token_pattern(),
            prop::option::of(token_pattern()),
            120i64..604800i64,
            token_pattern(),
            prop::option::of(token_pattern()),
        )
            .prop_map(|(access_token, refresh_token, expires_in, user_id, email)| Session {
                access_token,
                refresh_token,
                expires_at: Utc::now() + Duration::seconds(expires_in),
                user_id,
                email,
            })
    }

    // Property: stored sessions survive a save/load cycle untouched
    proptest! {
        #[test]
        fn session_store_roundtrip(session in arb_session()) {
            let store = InMemorySessionStore::default();
            store.save_session(&session).expect("save session");
            let loaded = store.load_session().expect("load session").expect("session exists");
            prop_assert_eq!(loaded, session);
        }
    }

    // Property: a live session is reused without touching the network
    proptest! {
        #[test]
        fn valid_session_is_reused(session in arb_session()) {
            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            runtime.block_on(async move {
                let store = Arc::new(InMemorySessionStore::default());
                store.save_session(&session).expect("save session");

                let client = Arc::new(FakeAuthClient::default());
                let manager = manager(Arc::clone(&store), Arc::clone(&client));
                let result = manager.ensure_session().await.expect("ensure session");

                assert!(matches!(result, EnsureSessionResult::Existing(_)));
                assert_eq!(client.refresh_calls.load(Ordering::SeqCst), 0);
                assert_eq!(client.password_calls.load(Ordering::SeqCst), 0);
            });
        }
    }

    #[tokio::test]
    async fn expired_session_with_refresh_token_is_refreshed() {
        let store = Arc::new(InMemorySessionStore::default());
        store
            .save_session(&Session {
                access_token: "expired".to_string(),
                refresh_token: Some("refresh-token".to_string()),
                expires_at: Utc::now() - Duration::seconds(120),
                user_id: "user-1".to_string(),
                email: None,
            })
            .expect("save session");

        let client = Arc::new(FakeAuthClient::default());
        client.set_refresh_response(FakeResponse::Success(SessionResponse {
            access_token: "new-access".to_string(),
            refresh_token: None,
            expires_in: 3600,
            user_id: "user-1".to_string(),
            email: None,
        }));

        let manager = manager(Arc::clone(&store), Arc::clone(&client));
        let result = manager.ensure_session().await.expect("ensure session");

        match result {
            EnsureSessionResult::Refreshed(session) => {
                assert_eq!(session.access_token, "new-access");
                assert_eq!(session.refresh_token, Some("refresh-token".to_string()));
            }
            _ => panic!("expected refreshed result"),
        }
    }

    #[tokio::test]
    async fn failed_refresh_requires_sign_in() {
        let store = Arc::new(InMemorySessionStore::default());
        store
            .save_session(&Session {
                access_token: "expired".to_string(),
                refresh_token: Some("refresh-token".to_string()),
                expires_at: Utc::now() - Duration::seconds(120),
                user_id: "user-1".to_string(),
                email: None,
            })
            .expect("save session");

        let client = Arc::new(FakeAuthClient::default());
        client.set_refresh_response(FakeResponse::AuthError("invalid_grant".to_string()));

        let manager = manager(Arc::clone(&store), Arc::clone(&client));
        let result = manager.ensure_session().await.expect("ensure session");
        assert_eq!(result, EnsureSessionResult::SignInRequired);
        assert_eq!(client.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn password_sign_in_saves_session_and_reports_identity() {
        let store = Arc::new(InMemorySessionStore::default());
        let client = Arc::new(FakeAuthClient::default());
        let manager = manager(Arc::clone(&store), Arc::clone(&client));

        let outcome = manager
            .sign_in_with_password("person@example.com", "secret")
            .await
            .expect("sign in");

        match outcome {
            AuthOutcome::SignedIn { user_id, email, .. } => {
                assert_eq!(user_id, "user-1");
                assert_eq!(email, Some("person@example.com".to_string()));
            }
            other => panic!("expected signed in, got {other:?}"),
        }
        assert!(store.load_session().expect("load").is_some());
    }

    #[tokio::test]
    async fn rejected_credentials_become_a_failed_outcome() {
        let store = Arc::new(InMemorySessionStore::default());
        let client = Arc::new(FakeAuthClient::default());
        client.set_password_response(FakeResponse::AuthError(
            "Invalid login credentials".to_string(),
        ));

        let manager = manager(Arc::clone(&store), Arc::clone(&client));
        let outcome = manager
            .sign_in_with_password("person@example.com", "wrong")
            .await
            .expect("sign in call itself succeeds");

        assert_eq!(
            outcome,
            AuthOutcome::Failed {
                reason: "Invalid login credentials".to_string()
            }
        );
        assert!(store.load_session().expect("load").is_none());
    }

    #[tokio::test]
    async fn sign_up_with_confirmation_pending_creates_no_session() {
        let store = Arc::new(InMemorySessionStore::default());
        let client = Arc::new(FakeAuthClient::default());
        client.require_sign_up_confirmation();

        let manager = manager(Arc::clone(&store), Arc::clone(&client));
        let outcome = manager
            .sign_up("person@example.com", "secret")
            .await
            .expect("sign up");

        assert_eq!(outcome, AuthOutcome::AccountCreated);
        assert!(store.load_session().expect("load").is_none());
    }

    #[tokio::test]
    async fn magic_link_reports_sent() {
        let store = Arc::new(InMemorySessionStore::default());
        let client = Arc::new(FakeAuthClient::default());
        let manager = manager(Arc::clone(&store), Arc::clone(&client));

        let outcome = manager
            .send_magic_link("person@example.com")
            .await
            .expect("magic link");
        assert_eq!(outcome, AuthOutcome::MagicLinkSent);

        let blank = manager.send_magic_link("   ").await.expect("magic link");
        assert!(matches!(blank, AuthOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn sign_out_revokes_and_clears_the_stored_session() {
        let store = Arc::new(InMemorySessionStore::default());
        store
            .save_session(&Session {
                access_token: "live".to_string(),
                refresh_token: None,
                expires_at: Utc::now() + Duration::hours(1),
                user_id: "user-1".to_string(),
                email: None,
            })
            .expect("save session");

        let client = Arc::new(FakeAuthClient::default());
        let manager = manager(Arc::clone(&store), Arc::clone(&client));
        manager.sign_out().await.expect("sign out");

        assert_eq!(client.sign_out_calls.load(Ordering::SeqCst), 1);
        assert!(store.load_session().expect("load").is_none());
    }
}
