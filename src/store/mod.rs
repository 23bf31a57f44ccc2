pub mod users;

pub use users::{NewUser, StoreError, UserPatch, UserStore};
