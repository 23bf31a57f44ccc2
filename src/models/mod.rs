pub mod user;

pub use user::{AuthProvider, User, UserStatus};
