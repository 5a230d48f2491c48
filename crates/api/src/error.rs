//! Unified error handling with Sentry integration.
//!
//! Handlers return `Result<T, AppError>`. Errors render as
//! `{"success": false, "message": "..."}`; server-side failures are captured
//! to Sentry and their details withheld from the client.
//!
//! Successful responses use [`ApiResponse`], which renders the matching
//! `{"success": true, "message": "...", "data": ...}` envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::PaymentError;
use crate::services::auth::AuthError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment gateway call failed.
    #[error("Payment gateway error: {0}")]
    Payment(#[from] PaymentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and client-facing message.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Auth(err) => auth_status(err),
            Self::Payment(_) => (
                StatusCode::BAD_GATEWAY,
                "Payment gateway error".to_string(),
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Internal(_) => internal(),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn repository_status(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, capitalize(msg)),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => internal(),
    }
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        AuthError::InvalidOtp => (
            StatusCode::UNAUTHORIZED,
            "Invalid or expired OTP".to_string(),
        ),
        AuthError::InvalidToken(_) => (
            StatusCode::UNAUTHORIZED,
            "Not authorized, token failed".to_string(),
        ),
        AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
        AuthError::EmailTaken => (
            StatusCode::BAD_REQUEST,
            "Email already registered".to_string(),
        ),
        AuthError::MobileTaken => (
            StatusCode::BAD_REQUEST,
            "Mobile number already registered".to_string(),
        ),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AuthError::InvalidEmail(_) => {
            (StatusCode::BAD_REQUEST, "Invalid email address".to_string())
        }
        AuthError::Repository(err) => repository_status(err),
        AuthError::PasswordHash => internal(),
    }
}

fn capitalize(msg: &str) -> String {
    let mut chars = msg.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (
            status,
            Json(ErrorBody {
                success: false,
                message: &message,
            }),
        )
            .into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Successful response envelope.
#[derive(Debug)]
pub struct ApiResponse<T> {
    status: StatusCode,
    message: String,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// `200 OK` with the default message.
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: "Success".to_string(),
            data,
        }
    }

    /// `201 Created` with a message.
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: message.into(),
            data,
        }
    }

    /// Replace the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl ApiResponse<()> {
    /// `200 OK` with a message and no data.
    pub fn done(message: impl Into<String>) -> Self {
        Self::ok(()).message(message)
    }
}

#[derive(Serialize)]
struct SuccessBody<'a, T> {
    success: bool,
    message: &'a str,
    data: &'a T,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(SuccessBody {
                success: true,
                message: &self.message,
                data: &self.data,
            }),
        )
            .into_response()
    }
}

/// Set the Sentry user context for the authenticated caller.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Product not found".to_string());
        assert_eq!(err.to_string(), "Not found: Product not found");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::Api {
                status: 401,
                message: "bad key".to_string()
            })),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_repository_errors_map_to_client_statuses() {
        assert_eq!(
            get_status(RepositoryError::NotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(RepositoryError::Conflict("category is in use".to_string()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RepositoryError::DataCorruption("bad email".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AuthError::Repository(RepositoryError::NotFound).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(
            get_status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::EmailTaken.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AuthError::UserNotFound.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AuthError::PasswordHash.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = AppError::BadRequest("Cart is empty".to_string()).into_response();
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Cart is empty");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let response = AppError::Internal("connection reset by peer".to_string()).into_response();
        let json = body_json(response).await;
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_conflict_message_capitalized() {
        let response: Response =
            AppError::from(RepositoryError::Conflict("category already exists".to_string()))
                .into_response();
        let json = body_json(response).await;
        assert_eq!(json["message"], "Category already exists");
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = ApiResponse::created(serde_json::json!({"id": 1}), "Created").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Created");
        assert_eq!(json["data"]["id"], 1);

        let json = body_json(ApiResponse::done("Password updated").into_response()).await;
        assert!(json["data"].is_null());
    }
}
