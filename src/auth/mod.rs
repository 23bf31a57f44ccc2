pub mod guard;
pub mod service;
pub mod session;

pub use guard::require_auth;
pub use service::{AuthError, AuthService, LoginResult};
pub use session::{SessionClaims, SessionError, SessionTokens};
