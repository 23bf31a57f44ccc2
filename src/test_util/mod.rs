//! Test helpers shared by unit and integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::auth::{AuthService, SessionTokens};
use crate::config::{Config, FirebaseConfig};
use crate::provider::{IdentityProvider, ProviderError, VerifiedIdentity};
use crate::store::UserStore;
use crate::AppState;

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        database_url: ":memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        session_ttl_secs: 900,
        firebase: FirebaseConfig {
            project_id: "test-project".to_string(),
            client_email: "svc@test-project.iam.gserviceaccount.com".to_string(),
            private_key: "unused".to_string(),
            api_key: "test-api-key".to_string(),
            jwks_url: "http://localhost:0/jwks".to_string(),
            accounts_url: "http://localhost:0".to_string(),
            timeout_secs: 2,
        },
        log_level: "debug".to_string(),
        cors_origins: "*".to_string(),
    }
}

pub fn test_identity(uid: &str, email: &str, identity_key: &str) -> VerifiedIdentity {
    VerifiedIdentity {
        uid: uid.to_string(),
        email: Some(email.to_string()),
        name: Some("Test User".to_string()),
        picture: Some("https://example.com/avatar.png".to_string()),
        identities: vec![identity_key.to_string()],
    }
}

/// Scriptable identity provider for tests: serves a fixed identity and
/// records revocations.
#[derive(Default)]
pub struct StubProvider {
    identity: Mutex<Option<VerifiedIdentity>>,
    verify_unavailable: AtomicBool,
    revocation_fails: AtomicBool,
    revoked: Mutex<Vec<String>>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: VerifiedIdentity) -> Self {
        let stub = Self::default();
        stub.set_identity(identity);
        stub
    }

    pub fn set_identity(&self, identity: VerifiedIdentity) {
        *self.identity.lock().unwrap() = Some(identity);
    }

    pub fn set_unavailable(&self) {
        self.verify_unavailable.store(true, Ordering::SeqCst);
    }

    pub fn fail_revocation(&self) {
        self.revocation_fails.store(true, Ordering::SeqCst);
    }

    pub fn revoked_uids(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    async fn verify_id_token(&self, _token: &str) -> Result<VerifiedIdentity, ProviderError> {
        if self.verify_unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("stub offline".to_string()));
        }
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProviderError::InvalidToken("no identity configured".to_string()))
    }

    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), ProviderError> {
        if self.revocation_fails.load(Ordering::SeqCst) {
            return Err(ProviderError::RevocationFailed("stub failure".to_string()));
        }
        self.revoked.lock().unwrap().push(uid.to_string());
        Ok(())
    }

    async fn create_custom_token(&self, uid: &str) -> Result<String, ProviderError> {
        Ok(format!("custom-token-for-{uid}"))
    }
}

/// Application state wired with an in-memory store and the given provider.
pub fn test_state(provider: Arc<dyn IdentityProvider>) -> Arc<AppState> {
    let config = test_config();
    let store = Arc::new(UserStore::new(&config.database_url).unwrap());
    let sessions = SessionTokens::new(&config.jwt_secret, config.session_ttl_secs);
    let auth = AuthService::new(provider, store.clone(), sessions);

    Arc::new(AppState {
        config,
        auth,
        store,
    })
}
