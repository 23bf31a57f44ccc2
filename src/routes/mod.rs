pub mod auth;
pub mod health;
pub mod rpc;
pub mod users;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

/// Assemble the full REST + RPC surface.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(auth::router(state.clone()))
        .merge(users::router(state.clone()))
        .merge(rpc::router(state))
}
