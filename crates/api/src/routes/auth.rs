//! Account route handlers: registration, login, OTP and passwords.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use loomshop_core::{UserId, UserRole};

use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// Login body. Exactly one of `password` or `otp` is used; `otp` wins.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
}

/// OTP request body.
#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub identifier: Option<String>,
}

/// Password reset body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

/// Password change body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

/// A signed-in account and its bearer token.
#[derive(Debug, Serialize)]
pub struct Session {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub role: UserRole,
    pub token: String,
}

impl Session {
    fn new(user: User, token: String) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email.into_inner(),
            mobile: user.mobile,
            role: user.role,
            token,
        }
    }
}

/// Trimmed, non-empty value of an optional field.
fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Create an account.
///
/// POST /api/auth/register
#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<ApiResponse<Session>> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Please provide name, email and password".to_string(),
        ));
    }

    let auth = AuthService::new(state.pool(), &state.config().jwt);
    let user = auth
        .register(
            &req.name,
            &req.email,
            req.mobile.as_deref(),
            &req.password,
            UserRole::User,
        )
        .await?;
    let token = auth.issue_token(&user)?;

    tracing::info!(user_id = %user.id, "Account registered");
    Ok(ApiResponse::created(
        Session::new(user, token),
        "User registered successfully",
    ))
}

/// Sign in with a password or a pending OTP.
///
/// POST /api/auth/login
#[instrument(skip(state, req))]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<ApiResponse<Session>> {
    let identifier = present(req.identifier.as_deref()).ok_or_else(|| {
        AppError::BadRequest("Please provide email or mobile number".to_string())
    })?;

    let auth = AuthService::new(state.pool(), &state.config().jwt);
    let user = if let Some(otp) = present(req.otp.as_deref()) {
        auth.login_with_otp(identifier, otp).await?
    } else if let Some(password) = req.password.as_deref().filter(|p| !p.is_empty()) {
        auth.login_with_password(identifier, password).await?
    } else {
        return Err(AppError::BadRequest(
            "Please provide password or OTP".to_string(),
        ));
    };
    let token = auth.issue_token(&user)?;

    tracing::info!(user_id = %user.id, "Signed in");
    Ok(ApiResponse::ok(Session::new(user, token)).message("Login successful"))
}

/// Email (and text) a one-time password.
///
/// POST /api/auth/send-otp
#[instrument(skip(state, req))]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(req): Json<SendOtpRequest>,
) -> Result<ApiResponse<()>> {
    let identifier = present(req.identifier.as_deref()).ok_or_else(|| {
        AppError::BadRequest("Please provide email or mobile number".to_string())
    })?;

    let (user, otp) = AuthService::new(state.pool(), &state.config().jwt)
        .issue_otp(identifier)
        .await?;

    state
        .notifier()
        .otp(user.email.as_str(), &user.name, user.mobile.as_deref(), &otp);

    Ok(ApiResponse::done(format!("OTP sent to {}", user.email)))
}

/// Set a new password using a pending OTP.
///
/// POST /api/auth/reset-password
#[instrument(skip(state, req))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<ApiResponse<()>> {
    let (Some(identifier), Some(otp), Some(new_password)) = (
        present(req.identifier.as_deref()),
        present(req.otp.as_deref()),
        req.new_password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest("Please provide all fields".to_string()));
    };

    AuthService::new(state.pool(), &state.config().jwt)
        .reset_password(identifier, otp, new_password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidOtp => AppError::BadRequest("Invalid or expired OTP".to_string()),
            other => other.into(),
        })?;

    Ok(ApiResponse::done("Password reset successful"))
}

/// Change the signed-in user's password.
///
/// PUT /api/auth/change-password
#[instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>> {
    let (Some(old_password), Some(new_password)) = (
        req.old_password.as_deref().filter(|p| !p.is_empty()),
        req.new_password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Please provide old and new password".to_string(),
        ));
    };

    AuthService::new(state.pool(), &state.config().jwt)
        .change_password(user.id, old_password, new_password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidCredentials => {
                AppError::Unauthorized("Incorrect old password".to_string())
            }
            other => other.into(),
        })?;

    Ok(ApiResponse::done("Password updated successfully"))
}

/// The signed-in user's profile.
///
/// GET /api/auth/me
#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn me(RequireAuth(user): RequireAuth) -> ApiResponse<User> {
    ApiResponse::ok(user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use loomshop_core::Email;

    use super::*;
    use crate::models::AddressBook;

    #[test]
    fn test_present_trims_and_drops_blank() {
        assert_eq!(present(Some("  asha@example.in ")), Some("asha@example.in"));
        assert_eq!(present(Some("   ")), None);
        assert_eq!(present(None), None);
    }

    #[test]
    fn test_login_request_accepts_either_secret() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"identifier":"9876543210","otp":"123456"}"#).unwrap();
        assert_eq!(req.otp.as_deref(), Some("123456"));
        assert!(req.password.is_none());
    }

    #[test]
    fn test_session_shape() {
        let user = User {
            id: UserId::new(3),
            name: "Asha".to_string(),
            email: Email::parse("asha@example.in").unwrap(),
            mobile: None,
            role: UserRole::Admin,
            addresses: AddressBook::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(Session::new(user, "tok".to_string())).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["email"], "asha@example.in");
        assert_eq!(json["role"], "ADMIN");
        assert_eq!(json["token"], "tok");
        assert!(json["mobile"].is_null());
    }
}
