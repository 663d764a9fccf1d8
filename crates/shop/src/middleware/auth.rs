//! Authentication extractors.
//!
//! Authentication itself is an upstream concern: a gateway middleware
//! verifies the caller's token and inserts an [`AuthContext`] into the
//! request extensions before the request reaches these handlers. The
//! extractors here only require that the context is present (and, for
//! admin routes, carries the admin role).

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};

use greenbasket_core::UserId;

use crate::error::AppError;

/// Role carried by the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

/// Authenticated caller context, inserted upstream.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    /// The authenticated user.
    pub user_id: UserId,
    /// The caller's role.
    pub role: Role,
}

/// Extractor that requires an authenticated caller.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireUser(ctx): RequireUser,
/// ) -> impl IntoResponse {
///     format!("Hello, user {}!", ctx.user_id)
/// }
/// ```
pub struct RequireUser(pub AuthContext);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;
        Ok(Self(ctx))
    }
}

/// Extractor that requires an authenticated caller with the admin role.
pub struct RequireAdmin(pub AuthContext);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireUser(ctx) = RequireUser::from_request_parts(parts, state).await?;
        if ctx.role != Role::Admin {
            return Err(AppError::Unauthorized("admin access required".to_owned()));
        }
        Ok(Self(ctx))
    }
}
