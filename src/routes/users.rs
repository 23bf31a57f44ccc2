use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;

use crate::auth::guard::require_auth;
use crate::models::User;
use crate::routes::auth::MessageResponse;
use crate::store::{StoreError, UserPatch};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// GET /users/me - current user record
async fn get_me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// PUT /users/me - patch name/avatar on the current user
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<User>, (StatusCode, String)> {
    let patch = UserPatch {
        name: body.name,
        avatar: body.avatar,
        status: None,
    };

    let updated = state
        .store
        .update(&user.id, patch)
        .map_err(store_error_response)?;
    Ok(Json(updated))
}

/// DELETE /users/me - delete the current user account
async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    state.store.delete(&user.id).map_err(store_error_response)?;
    Ok(Json(MessageResponse {
        message: "Account deleted successfully".to_string(),
    }))
}

/// GET /users/:id - fetch a user by id
async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<User>, (StatusCode, String)> {
    let user = state.store.find_by_id(&id).map_err(store_error_response)?;
    Ok(Json(user))
}

/// Directory lookups are not a security-sensitive boundary; NotFound
/// surfaces as a plain 404.
fn store_error_response(e: StoreError) -> (StatusCode, String) {
    match e {
        StoreError::NotFound(id) => (StatusCode::NOT_FOUND, format!("User {id} not found")),
        other => {
            tracing::error!(error = %other, "user store error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users/me", get(get_me).put(update_me).delete(delete_me))
        .route("/users/:id", get(get_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}
