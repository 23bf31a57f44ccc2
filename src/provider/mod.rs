pub mod firebase;

pub use firebase::FirebaseClient;

use async_trait::async_trait;

use crate::models::AuthProvider;

/// Claims extracted from a verified identity assertion.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// The provider's stable subject id (Firebase UID).
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    /// Identity-provider keys embedded in the token (`google.com`,
    /// `facebook.com`, ...).
    pub identities: Vec<String>,
}

impl VerifiedIdentity {
    /// Sign-in method derived from the provider markers in the token.
    /// Defaults to `email` when no recognized marker is present.
    pub fn sign_in_method(&self) -> AuthProvider {
        if self.identities.iter().any(|p| p == "google.com") {
            AuthProvider::Google
        } else if self.identities.iter().any(|p| p == "facebook.com") {
            AuthProvider::Facebook
        } else {
            AuthProvider::Email
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid identity token: {0}")]
    InvalidToken(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("token revocation failed: {0}")]
    RevocationFailed(String),
    #[error("custom token creation failed: {0}")]
    CustomToken(String),
}

/// Capability interface over the external identity provider.
///
/// Constructed explicitly at startup and injected; there is no hidden
/// global SDK state.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an externally issued ID token and extract its claims.
    ///
    /// A timeout or unreachable provider is `Unavailable`, never a
    /// definitive invalid result.
    async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, ProviderError>;

    /// Revoke the subject's outstanding refresh tokens. Idempotent on the
    /// provider side; failure must surface to the caller.
    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), ProviderError>;

    /// Mint a provider custom token for the subject.
    async fn create_custom_token(&self, uid: &str) -> Result<String, ProviderError>;
}
