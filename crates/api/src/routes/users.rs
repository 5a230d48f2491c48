//! User administration and profile route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use loomshop_core::{Email, UserId, UserRole};

use super::not_found_as;
use crate::db::{RepositoryError, UserRepository};
use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth, RequireSuperAdmin};
use crate::models::{AddressBook, User, UserSummary};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Admin account creation body.
#[derive(Debug, Deserialize)]
pub struct NewAdminRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Profile update body. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub addresses: AddressBook,
}

/// Every account, for the admin console.
///
/// GET /api/users
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<ApiResponse<Vec<UserSummary>>> {
    let users = UserRepository::new(state.pool()).list_summaries().await?;
    Ok(ApiResponse::ok(users))
}

/// Create an admin account.
///
/// POST /api/users/admin
#[instrument(skip(state, caller, body), fields(caller_id = %caller.id, email = %body.email))]
pub async fn create_admin(
    State(state): State<AppState>,
    RequireSuperAdmin(caller): RequireSuperAdmin,
    Json(body): Json<NewAdminRequest>,
) -> Result<ApiResponse<UserSummary>> {
    if body.name.trim().is_empty() || body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::BadRequest(
            "Please provide name, email and password".to_string(),
        ));
    }

    let user = AuthService::new(state.pool(), &state.config().jwt)
        .register(&body.name, &body.email, None, &body.password, UserRole::Admin)
        .await
        .map_err(|e| match e {
            AuthError::EmailTaken => AppError::BadRequest("User exists".to_string()),
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, "Admin account created");
    Ok(ApiResponse::created(
        UserSummary {
            id: user.id,
            name: user.name,
            email: user.email.into_inner(),
            role: user.role,
            created_at: user.created_at,
        },
        "Admin created",
    ))
}

/// Delete an account that has no orders.
///
/// DELETE /api/users/{id}
#[instrument(skip(state, caller), fields(caller_id = %caller.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireSuperAdmin(caller): RequireSuperAdmin,
    Path(id): Path<UserId>,
) -> Result<ApiResponse<()>> {
    if id == caller.id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }

    UserRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(|e| not_found_as(e, "User not found"))?;

    tracing::info!(user_id = %id, "Account deleted");
    Ok(ApiResponse::done("User removed"))
}

/// Update the signed-in user's name, email or addresses.
///
/// PUT /api/users/me
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<ProfileUpdate>,
) -> Result<ApiResponse<User>> {
    let name = body.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let email = body
        .email
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .map(Email::parse)
        .transpose()
        .map_err(|_| AppError::BadRequest("Invalid email address".to_string()))?;

    let users = UserRepository::new(state.pool());
    if let Some(email) = &email
        && users.email_taken(email, Some(user.id)).await?
    {
        return Err(email_in_use());
    }

    let updated = users
        .update_profile(user.id, name, email.as_ref(), &body.addresses)
        .await
        .map_err(|e| match e {
            // Lost a race with another account claiming the same address
            RepositoryError::Conflict(_) => email_in_use(),
            other => not_found_as(other, "User not found"),
        })?;

    Ok(ApiResponse::ok(updated).message("Profile updated"))
}

fn email_in_use() -> AppError {
    AppError::BadRequest("Email already in use".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_mixes_identity_and_addresses() {
        let body: ProfileUpdate = serde_json::from_str(
            r#"{"name":"Asha K","shippingCity":"Pune","billingCountry":"India"}"#,
        )
        .unwrap();
        assert_eq!(body.name.as_deref(), Some("Asha K"));
        assert!(body.email.is_none());
        assert_eq!(body.addresses.shipping_city.as_deref(), Some("Pune"));
        assert_eq!(body.addresses.billing_country.as_deref(), Some("India"));
    }
}
