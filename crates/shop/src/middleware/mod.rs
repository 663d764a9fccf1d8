//! Request middleware and extractors.

pub mod auth;

pub use auth::{AuthContext, RequireAdmin, RequireUser, Role};
