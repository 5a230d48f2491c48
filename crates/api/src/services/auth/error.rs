//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] loomshop_core::EmailError),

    /// Wrong password or unknown identifier.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// OTP does not match or has expired.
    #[error("invalid or expired OTP")]
    InvalidOtp,

    /// No account for the given identifier.
    #[error("user not found")]
    UserNotFound,

    /// Email address already registered.
    #[error("email already registered")]
    EmailTaken,

    /// Mobile number already registered.
    #[error("mobile number already registered")]
    MobileTaken,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Bearer token missing, malformed, expired or badly signed.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
