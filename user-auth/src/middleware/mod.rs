pub mod auth;

pub use auth::{role_guard_middleware, CurrentIdentity, RoleGuard};
