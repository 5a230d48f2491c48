//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin user
//! loomshop admin create -e admin@example.com -n "Admin Name" -p 'secret-pass' -r super_admin
//!
//! # Create the store owner unless they already exist
//! loomshop seed -e owner@example.com -p 'secret-pass'
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string

use loomshop_api::db::{NewUser, RepositoryError, UserRepository};
use loomshop_api::services::auth::{AuthError, hash_password, validate_password};
use loomshop_core::{Email, UserId, UserRole};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    /// Query failed.
    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: super_admin, admin")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password rejected or could not be hashed.
    #[error("{0}")]
    Password(#[from] AuthError),

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),
}

/// Parse a role accepted for admin accounts.
fn parse_admin_role(role: &str) -> Result<UserRole, AdminError> {
    match role.parse::<UserRole>() {
        Ok(role) if role.is_admin() => Ok(role),
        _ => Err(AdminError::InvalidRole(role.to_owned())),
    }
}

/// Create a new admin user.
///
/// # Arguments
///
/// * `email` - Admin's email address
/// * `name` - Admin's display name
/// * `password` - Initial password (at least 8 characters)
/// * `role` - Admin's role (`super_admin` or `admin`)
///
/// # Returns
///
/// The ID of the created admin user.
pub async fn create_user(
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> Result<UserId, AdminError> {
    let role = parse_admin_role(role)?;
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    validate_password(password)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    tracing::info!("Creating admin user: {} ({})", email, role);

    let password_hash = hash_password(password)?;
    let user = users
        .create(&NewUser {
            name,
            email: &email,
            mobile: None,
            password_hash: &password_hash,
            role,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => AdminError::UserExists(email.to_string()),
            other => other.into(),
        })?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );

    Ok(user.id)
}

/// Create the store owner as a super admin unless the email is registered.
///
/// An existing account is left exactly as it is, so running the seed twice
/// is harmless.
pub async fn seed(email: &str, name: &str, password: &str) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    validate_password(password)?;

    let pool = connect().await?;
    let password_hash = hash_password(password)?;

    let created = UserRepository::new(&pool)
        .create_if_absent(&NewUser {
            name,
            email: &email,
            mobile: None,
            password_hash: &password_hash,
            role: UserRole::SuperAdmin,
        })
        .await?;

    match created {
        Some(user) => tracing::info!("Seeded super admin {} (ID: {})", user.email, user.id),
        None => tracing::info!("{} already exists, nothing to seed", email),
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_roles() {
        assert_eq!(parse_admin_role("admin").unwrap(), UserRole::Admin);
        assert_eq!(parse_admin_role("super_admin").unwrap(), UserRole::SuperAdmin);
        assert!(matches!(
            parse_admin_role("user"),
            Err(AdminError::InvalidRole(_))
        ));
        assert!(parse_admin_role("viewer").is_err());
    }
}
