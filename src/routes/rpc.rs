use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::guard::bearer_token;
use crate::models::{AuthProvider, User};
use crate::routes::auth::{LoginRequest, LogoutRequest};
use crate::AppState;

/// RPC call context: the optional authenticated user. An invalid bearer
/// value leaves the context anonymous; protected procedures then reject it.
struct RpcContext {
    user: Option<User>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomTokenRequest {
    user_id: String,
}

#[derive(Serialize)]
struct RpcSuccess<T: Serialize> {
    success: bool,
    data: T,
}

fn ok<T: Serialize>(data: T) -> Response {
    Json(RpcSuccess {
        success: true,
        data,
    })
    .into_response()
}

fn error(status: StatusCode, code: &'static str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": { "code": code, "message": message },
        })),
    )
        .into_response()
}

fn unauthorized() -> Response {
    error(
        StatusCode::UNAUTHORIZED,
        "UNAUTHORIZED",
        "You must be logged in to access this resource",
    )
}

fn parse_input<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body)
        .map_err(|e| error(StatusCode::BAD_REQUEST, "BAD_REQUEST", &e.to_string()))
}

/// POST /trpc/:procedure - JSON procedure dispatch.
///
/// Mirrors the typed API surface: the input is the request body, results
/// come back in a success/data envelope.
async fn handle(
    State(state): State<Arc<AppState>>,
    Path(procedure): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = resolve_context(&state, &headers);

    match procedure.as_str() {
        "auth.loginGoogle" => login(&state, AuthProvider::Google, &body).await,
        "auth.loginFacebook" => login(&state, AuthProvider::Facebook, &body).await,
        "auth.getProfile" => match ctx.user {
            Some(user) => ok(user),
            None => unauthorized(),
        },
        "auth.verifyToken" => match ctx.user {
            Some(user) => ok(json!({
                "valid": true,
                "user": user,
                "timestamp": Utc::now().to_rfc3339(),
            })),
            None => unauthorized(),
        },
        "auth.logout" => {
            if ctx.user.is_none() {
                return unauthorized();
            }
            let input: LogoutRequest = match parse_input(&body) {
                Ok(input) => input,
                Err(response) => return response,
            };
            match state.auth.logout(&input.firebase_uid).await {
                Ok(()) => ok(json!({ "message": "Logged out successfully" })),
                Err(e) => {
                    tracing::error!(error = %e, "rpc logout failed");
                    error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_SERVER_ERROR",
                        "Logout failed",
                    )
                }
            }
        }
        "auth.generateCustomToken" => {
            let user = match ctx.user {
                Some(user) => user,
                None => return unauthorized(),
            };
            let input: CustomTokenRequest = match parse_input(&body) {
                Ok(input) => input,
                Err(response) => return response,
            };
            if user.id != input.user_id {
                return error(
                    StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "You can only generate tokens for yourself",
                );
            }
            match state.auth.custom_token(&input.user_id).await {
                Ok(custom_token) => ok(json!({ "customToken": custom_token })),
                Err(e) => {
                    tracing::error!(error = %e, "rpc custom token failed");
                    error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_SERVER_ERROR",
                        "Failed to generate custom token",
                    )
                }
            }
        }
        "auth.health" => ok(json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339(),
            "service": "auth",
        })),
        _ => error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("No such procedure: {procedure}"),
        ),
    }
}

async fn login(state: &AppState, method: AuthProvider, body: &Bytes) -> Response {
    let input: LoginRequest = match parse_input(body) {
        Ok(input) => input,
        Err(response) => return response,
    };

    match state.auth.login_with(method, &input.firebase_token).await {
        Ok(result) => ok(result),
        Err(e) => {
            tracing::warn!(error = %e, provider = %method, "rpc login failed");
            error(
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                &format!("{method} login failed"),
            )
        }
    }
}

fn resolve_context(state: &AppState, headers: &HeaderMap) -> RpcContext {
    let user = bearer_token(headers).and_then(|token| match state.auth.verify_token(token) {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::warn!(error = %e, "rpc call with invalid credential");
            None
        }
    });
    RpcContext { user }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/trpc/:procedure", post(handle))
        .with_state(state)
}
