use std::sync::Arc;

use serde::Serialize;

use crate::models::{AuthProvider, User};
use crate::provider::{IdentityProvider, ProviderError, VerifiedIdentity};
use crate::store::{NewUser, StoreError, UserPatch, UserStore};

use super::session::{SessionError, SessionTokens};

/// Outcome of a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub user: User,
    pub access_token: String,
}

/// Internal error taxonomy for the auth core. The HTTP/RPC boundary
/// collapses most of these to a generic unauthorized response; the
/// distinct kinds exist for logging and tests.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid identity assertion: {0}")]
    InvalidAssertion(String),
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("wrong provider: expected {expected}, token was issued via {actual}")]
    WrongProvider {
        expected: AuthProvider,
        actual: AuthProvider,
    },
    #[error("session token expired")]
    Expired,
    #[error("malformed session token: {0}")]
    Malformed(String),
    #[error("user not found")]
    UserNotFound,
    #[error("user is inactive")]
    UserInactive,
    #[error("token revocation failed: {0}")]
    RevocationFailed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProviderError> for AuthError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::InvalidToken(msg) => AuthError::InvalidAssertion(msg),
            ProviderError::Unavailable(msg) => AuthError::ProviderUnavailable(msg),
            ProviderError::RevocationFailed(msg) => AuthError::RevocationFailed(msg),
            ProviderError::CustomToken(msg) => AuthError::ProviderUnavailable(msg),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Expired => AuthError::Expired,
            SessionError::Malformed(msg) => AuthError::Malformed(msg),
        }
    }
}

/// Bridges externally verified identities to local user records and
/// locally issued session tokens.
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<UserStore>,
    sessions: SessionTokens,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<UserStore>,
        sessions: SessionTokens,
    ) -> Self {
        Self {
            provider,
            store,
            sessions,
        }
    }

    /// Verify the assertion, enforce the provider policy, create or refresh
    /// the user record, and issue a session token.
    pub async fn login_with(
        &self,
        method: AuthProvider,
        assertion: &str,
    ) -> Result<LoginResult, AuthError> {
        let identity = self.provider.verify_id_token(assertion).await?;

        let actual = identity.sign_in_method();
        if actual != method {
            return Err(AuthError::WrongProvider {
                expected: method,
                actual,
            });
        }

        let user = self.create_or_refresh(&identity, method)?;
        let access_token = self.sessions.issue(&user)?;

        tracing::info!(user = %user.id, provider = %method, "login succeeded");

        Ok(LoginResult { user, access_token })
    }

    fn create_or_refresh(
        &self,
        identity: &VerifiedIdentity,
        method: AuthProvider,
    ) -> Result<User, AuthError> {
        let refresh = UserPatch {
            name: identity.name.clone(),
            avatar: identity.picture.clone(),
            status: None,
        };

        if self.store.find_by_firebase_uid(&identity.uid)?.is_some() {
            return Ok(self.store.update_by_firebase_uid(&identity.uid, refresh)?);
        }

        let email = identity
            .email
            .clone()
            .ok_or_else(|| AuthError::InvalidAssertion("assertion carries no email".to_string()))?;
        let name = identity
            .name
            .clone()
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let data = NewUser {
            email,
            name,
            firebase_uid: identity.uid.clone(),
            provider: method,
            avatar: identity.picture.clone(),
        };

        match self.store.create(data) {
            Ok(user) => {
                tracing::info!(user = %user.id, "new user created");
                Ok(user)
            }
            // Lost a concurrent first-login race: the row exists now, so
            // take the repeat-login refresh path instead of failing.
            Err(StoreError::Conflict(_)) => {
                Ok(self.store.update_by_firebase_uid(&identity.uid, refresh)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Validate a session token and resolve the user behind it. Includes
    /// the directory liveness read: inactive users are rejected even with
    /// a well-signed, unexpired token.
    pub fn verify_token(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.sessions.validate(token)?;

        let user = match self.store.find_by_id(&claims.sub) {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(AuthError::UserNotFound),
            Err(e) => return Err(e.into()),
        };

        if !user.is_active() {
            return Err(AuthError::UserInactive);
        }

        Ok(user)
    }

    /// Revoke the subject's provider credentials. Failure surfaces: a
    /// swallowed revocation would leave outstanding tokens valid until
    /// natural expiry.
    pub async fn logout(&self, firebase_uid: &str) -> Result<(), AuthError> {
        self.provider.revoke_refresh_tokens(firebase_uid).await?;
        tracing::info!("User {} logged out", firebase_uid);
        Ok(())
    }

    /// Mint a provider custom token for the given local user.
    pub async fn custom_token(&self, user_id: &str) -> Result<String, AuthError> {
        let user = match self.store.find_by_id(user_id) {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(AuthError::UserNotFound),
            Err(e) => return Err(e.into()),
        };
        Ok(self.provider.create_custom_token(&user.firebase_uid).await?)
    }
}
