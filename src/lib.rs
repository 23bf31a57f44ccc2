pub mod auth;
pub mod config;
pub mod logging;
pub mod models;
pub mod provider;
pub mod routes;
pub mod store;
pub mod test_util;

pub use auth::{AuthError, AuthService, SessionTokens};
pub use config::Config;
pub use models::{AuthProvider, User, UserStatus};
pub use provider::{FirebaseClient, IdentityProvider, VerifiedIdentity};
pub use store::{NewUser, UserPatch, UserStore};

use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub auth: AuthService,
    pub store: Arc<UserStore>,
}
