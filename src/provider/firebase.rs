use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use crate::config::FirebaseConfig;

use super::{IdentityProvider, ProviderError, VerifiedIdentity};

/// Audience required on Firebase custom tokens.
const CUSTOM_TOKEN_AUD: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Custom tokens are valid for one hour, the maximum Firebase accepts.
const CUSTOM_TOKEN_TTL_SECS: i64 = 3600;

/// Firebase identity-provider client.
///
/// ID tokens are verified locally against Google's published JWKS for
/// `securetoken@system.gserviceaccount.com`; keys are cached and refreshed
/// when a token arrives with an unknown `kid` (key rotation). Revocation
/// goes through the Identity Toolkit account endpoint.
pub struct FirebaseClient {
    http_client: Client,
    project_id: String,
    jwks_url: String,
    accounts_url: String,
    api_key: String,
    service_account_email: String,
    signing_key: EncodingKey,
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl std::fmt::Debug for FirebaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseClient")
            .field("project_id", &self.project_id)
            .field("jwks_url", &self.jwks_url)
            .field("accounts_url", &self.accounts_url)
            .field("service_account_email", &self.service_account_email)
            .finish_non_exhaustive()
    }
}

/// JWKS key set response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

/// Claims of a Firebase ID token. Issuer, audience and expiry are checked
/// by `jsonwebtoken`; the rest feeds the verified identity.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    firebase: Option<FirebaseMetadata>,
}

#[derive(Debug, Deserialize)]
struct FirebaseMetadata {
    #[serde(default)]
    identities: HashMap<String, serde_json::Value>,
    #[serde(default)]
    sign_in_provider: Option<String>,
}

#[derive(Debug, Serialize)]
struct CustomTokenClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'static str,
    uid: &'a str,
    iat: i64,
    exp: i64,
}

impl FirebaseClient {
    pub async fn new(config: &FirebaseConfig) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let signing_key = EncodingKey::from_rsa_pem(config.private_key.as_bytes())
            .map_err(|e| ProviderError::CustomToken(format!("invalid service account key: {e}")))?;

        let client = Self {
            http_client,
            project_id: config.project_id.clone(),
            jwks_url: config.jwks_url.clone(),
            accounts_url: config.accounts_url.clone(),
            api_key: config.api_key.clone(),
            service_account_email: config.client_email.clone(),
            signing_key,
            keys: RwLock::new(HashMap::new()),
        };

        // Fetch keys initially
        client.refresh_keys().await?;

        Ok(client)
    }

    async fn refresh_keys(&self) -> Result<(), ProviderError> {
        tracing::info!("Fetching Firebase JWKS from {}", self.jwks_url);

        let response: JwksResponse = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let mut keys = self.keys.write().await;
        keys.clear();

        for jwk in response.keys {
            if jwk.kty == "RSA" {
                if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                    match DecodingKey::from_rsa_components(n, e) {
                        Ok(key) => {
                            keys.insert(jwk.kid.clone(), key);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse RSA key {}: {}", jwk.kid, e);
                        }
                    }
                }
            }
        }

        tracing::info!("Loaded {} Firebase signing keys", keys.len());
        Ok(())
    }

    async fn decoding_key(&self, kid: &str) -> Result<Option<DecodingKey>, ProviderError> {
        {
            let keys = self.keys.read().await;
            if let Some(key) = keys.get(kid) {
                return Ok(Some(key.clone()));
            }
        }

        // Unknown kid: the provider may have rotated keys since startup.
        self.refresh_keys().await?;

        let keys = self.keys.read().await;
        Ok(keys.get(kid).cloned())
    }
}

#[async_trait]
impl IdentityProvider for FirebaseClient {
    async fn verify_id_token(&self, token: &str) -> Result<VerifiedIdentity, ProviderError> {
        let header =
            decode_header(token).map_err(|e| ProviderError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| ProviderError::InvalidToken("missing kid in token header".to_string()))?;

        let key = self
            .decoding_key(&kid)
            .await?
            .ok_or_else(|| ProviderError::InvalidToken(format!("no signing key for kid {kid}")))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);
        validation.set_audience(&[&self.project_id]);

        let token_data = decode::<IdTokenClaims>(token, &key, &validation)
            .map_err(|e| ProviderError::InvalidToken(e.to_string()))?;

        let claims = token_data.claims;
        let identities = match claims.firebase {
            Some(meta) if !meta.identities.is_empty() => {
                meta.identities.keys().cloned().collect()
            }
            Some(meta) => meta.sign_in_provider.into_iter().collect(),
            None => Vec::new(),
        };

        tracing::debug!("ID token verified for subject {}", claims.sub);

        Ok(VerifiedIdentity {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
            identities,
        })
    }

    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), ProviderError> {
        let url = format!("{}/v1/accounts:update?key={}", self.accounts_url, self.api_key);
        let body = json!({
            "localId": uid,
            "validSince": Utc::now().timestamp().to_string(),
        });

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RevocationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::RevocationFailed(format!(
                "provider returned {}",
                response.status()
            )));
        }

        tracing::info!("Refresh tokens revoked for subject {}", uid);
        Ok(())
    }

    async fn create_custom_token(&self, uid: &str) -> Result<String, ProviderError> {
        let now = Utc::now().timestamp();
        let claims = CustomTokenClaims {
            iss: &self.service_account_email,
            sub: &self.service_account_email,
            aud: CUSTOM_TOKEN_AUD,
            uid,
            iat: now,
            exp: now + CUSTOM_TOKEN_TTL_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| ProviderError::CustomToken(e.to_string()))
    }
}
