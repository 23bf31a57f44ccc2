use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::guard::require_auth;
use crate::auth::LoginResult;
use crate::models::{AuthProvider, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub firebase_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub firebase_uid: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user: User,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
struct AuthHealthResponse {
    status: &'static str,
    service: &'static str,
    timestamp: String,
    providers: [&'static str; 2],
}

/// POST /auth/google - login with a Google-issued Firebase token
async fn google_login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResult>, (StatusCode, String)> {
    login(&state, AuthProvider::Google, &body.firebase_token).await
}

/// POST /auth/facebook - login with a Facebook-issued Firebase token
async fn facebook_login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResult>, (StatusCode, String)> {
    login(&state, AuthProvider::Facebook, &body.firebase_token).await
}

/// Shared login path. Every failure collapses to a generic 401; the
/// distinct error kind only reaches the logs.
async fn login(
    state: &AppState,
    method: AuthProvider,
    token: &str,
) -> Result<Json<LoginResult>, (StatusCode, String)> {
    match state.auth.login_with(method, token).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::warn!(error = %e, provider = %method, "login failed");
            Err((StatusCode::UNAUTHORIZED, format!("{method} login failed")))
        }
    }
}

/// GET /auth/profile - current user profile (protected)
async fn profile(Extension(user): Extension<User>) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        user,
        message: "Profile retrieved successfully",
    })
}

/// GET /auth/verify - confirm the presented credential is valid (protected)
async fn verify(Extension(user): Extension<User>) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        user,
        message: "Token is valid",
    })
}

/// POST /auth/logout - revoke provider credentials (protected)
async fn logout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LogoutRequest>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    match state.auth.logout(&body.firebase_uid).await {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        })),
        // A failed revocation leaves outstanding credentials valid, so it
        // must surface as a server error rather than a quiet success.
        Err(e) => {
            tracing::error!(error = %e, "logout failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Logout failed".to_string(),
            ))
        }
    }
}

/// GET /auth/health - auth-service health document
async fn auth_health() -> Json<AuthHealthResponse> {
    Json(AuthHealthResponse {
        status: "ok",
        service: "auth",
        timestamp: Utc::now().to_rfc3339(),
        providers: ["google", "facebook"],
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/auth/profile", get(profile))
        .route("/auth/verify", get(verify))
        .route("/auth/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    Router::new()
        .route("/auth/google", post(google_login))
        .route("/auth/facebook", post(facebook_login))
        .route("/auth/health", get(auth_health))
        .with_state(state)
        .merge(protected)
}
