//! Bearer-token authentication extractors.
//!
//! Each extractor verifies the `Authorization: Bearer <jwt>` header, then
//! re-loads the user so that deleted accounts and changed roles take effect
//! immediately.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn my_orders(RequireAuth(user): RequireAuth, State(state): State<AppState>) -> ... {
//!     OrderRepository::new(state.pool()).list_for_user(user.id).await
//! }
//! ```

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use tracing::Span;

use loomshop_core::UserRole;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::auth::decode_token;
use crate::state::AppState;

/// Extractor that requires a signed-in user.
pub struct RequireAuth(pub User);

/// Extractor that requires an admin or super admin.
pub struct RequireAdmin(pub User);

/// Extractor that requires a super admin.
pub struct RequireSuperAdmin(pub User);

/// Pull the token out of an `Authorization` header value.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<User, AppError> {
    let token = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

    let claims = decode_token(&state.config().jwt, token)?;
    let user_id = claims.user_id()?;

    let user = UserRepository::new(state.pool())
        .get_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Not authorized, user not found".to_string()))?;

    Span::current().record("user_id", user.id.as_i32());
    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok(user)
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if !user.role.is_admin() {
            return Err(AppError::Forbidden("Not authorized as admin".to_string()));
        }
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if user.role != UserRole::SuperAdmin {
            return Err(AppError::Forbidden(
                "Not authorized as super admin".to_string(),
            ));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer"), None);
    }
}
