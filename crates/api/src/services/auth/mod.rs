//! Authentication service.
//!
//! Provides password and one-time-password login, and stateless HS256 bearer
//! tokens. Tokens carry only the user ID and role; every authenticated request
//! re-loads the user, so deleting an account revokes its tokens.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use loomshop_core::{Email, UserId, UserRole};

use crate::config::JwtConfig;
use crate::db::{NewUser, RepositoryError, UserRepository};
use crate::models::User;
use crate::services::payment::constant_time_compare;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// How long an emailed/texted OTP stays valid.
pub const OTP_TTL_MINUTES: i64 = 10;

/// Bearer token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID, as a decimal string.
    pub sub: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// The user this token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if `sub` is not a user ID.
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| AuthError::InvalidToken(ErrorKind::InvalidSubject.into()))
    }
}

/// Authentication service.
///
/// Handles registration, login, OTP issue and password changes.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    jwt: &'a JwtConfig,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, jwt: &'a JwtConfig) -> Self {
        Self {
            users: UserRepository::new(pool),
            jwt,
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a new account with the given role. Its cart is created alongside.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::EmailTaken` / `AuthError::MobileTaken` on duplicates.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        mobile: Option<&str>,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let mobile = mobile.map(str::trim).filter(|m| !m.is_empty());

        validate_password(password)?;

        if self.users.email_taken(&email, None).await? {
            return Err(AuthError::EmailTaken);
        }
        if let Some(mobile) = mobile
            && self.users.mobile_taken(mobile).await?
        {
            return Err(AuthError::MobileTaken);
        }

        let password_hash = hash_password(password)?;

        // The existence checks above race with concurrent sign-ups; the unique
        // constraints are the final word.
        self.users
            .create(&NewUser {
                name: name.trim(),
                email: &email,
                mobile,
                password_hash: &password_hash,
                role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(field) if field == "mobile" => AuthError::MobileTaken,
                RepositoryError::Conflict(_) => AuthError::EmailTaken,
                other => AuthError::Repository(other),
            })
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Login with an email or mobile number and a password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the identifier or password is wrong.
    pub async fn login_with_password(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let credentials = self
            .users
            .get_credentials(identifier)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &credentials.password_hash)?;

        Ok(credentials.user)
    }

    /// Login with an email or mobile number and a pending OTP.
    ///
    /// A successful login consumes the OTP; a code can sign in only once.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the identifier is unknown.
    /// Returns `AuthError::InvalidOtp` if the OTP is wrong or expired.
    pub async fn login_with_otp(&self, identifier: &str, otp: &str) -> Result<User, AuthError> {
        let credentials = self
            .users
            .get_credentials(identifier)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        check_otp(
            otp,
            credentials.otp_hash.as_deref(),
            credentials.otp_expires_at,
            Utc::now(),
        )?;
        if !self
            .users
            .consume_otp(credentials.user.id, &hash_otp(otp))
            .await?
        {
            return Err(AuthError::InvalidOtp);
        }

        Ok(credentials.user)
    }

    // =========================================================================
    // One-Time Passwords
    // =========================================================================

    /// Generate and store a fresh OTP for the account, replacing any pending one.
    ///
    /// Returns the user and the plain OTP for delivery; only its hash is stored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if no account matches the identifier.
    pub async fn issue_otp(&self, identifier: &str) -> Result<(User, String), AuthError> {
        let credentials = self
            .users
            .get_credentials(identifier)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let otp = generate_otp();
        let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);
        self.users
            .set_otp(credentials.user.id, &hash_otp(&otp), expires_at)
            .await?;

        Ok((credentials.user, otp))
    }

    /// Set a new password using a pending OTP. Consumes the OTP.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the identifier is unknown.
    /// Returns `AuthError::InvalidOtp` if the OTP is wrong or expired.
    /// Returns `AuthError::WeakPassword` if the new password is too short.
    pub async fn reset_password(
        &self,
        identifier: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let credentials = self
            .users
            .get_credentials(identifier)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        check_otp(
            otp,
            credentials.otp_hash.as_deref(),
            credentials.otp_expires_at,
            Utc::now(),
        )?;
        validate_password(new_password)?;

        let password_hash = hash_password(new_password)?;
        if !self
            .users
            .reset_password(credentials.user.id, &hash_otp(otp), &password_hash)
            .await?
        {
            return Err(AuthError::InvalidOtp);
        }

        Ok(())
    }

    /// Change the password of a signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the old password is wrong.
    /// Returns `AuthError::WeakPassword` if the new password is too short.
    pub async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let current = self
            .users
            .get_password_hash(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        verify_password(old_password, &current)?;
        validate_password(new_password)?;

        let password_hash = hash_password(new_password)?;
        self.users.update_password(user_id, &password_hash).await?;

        Ok(())
    }

    // =========================================================================
    // Bearer Tokens
    // =========================================================================

    /// Issue a signed bearer token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if signing fails.
    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        issue_token(self.jwt, user.id, user.role, Utc::now())
    }
}

/// Sign a bearer token valid for the configured number of days from `now`.
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` if signing fails.
pub fn issue_token(
    config: &JwtConfig,
    user_id: UserId,
    role: UserRole,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let claims = Claims {
        sub: user_id.as_i32().to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + Duration::days(config.ttl_days)).timestamp(),
    };

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.expose_secret().as_bytes()),
    )?;
    Ok(token)
}

/// Verify a bearer token's signature and expiry and return its claims.
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` for malformed, tampered or expired tokens.
pub fn decode_token(config: &JwtConfig, token: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.expose_secret().as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Generate a 6-digit one-time password.
#[must_use]
pub fn generate_otp() -> String {
    use rand::Rng;
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

/// SHA-256 hex digest of an OTP, as stored in the database.
#[must_use]
pub fn hash_otp(otp: &str) -> String {
    hex::encode(Sha256::digest(otp.trim().as_bytes()))
}

/// Check a submitted OTP against the stored hash and expiry.
fn check_otp(
    otp: &str,
    stored_hash: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let (Some(stored_hash), Some(expires_at)) = (stored_hash, expires_at) else {
        return Err(AuthError::InvalidOtp);
    };
    if expires_at <= now || !constant_time_compare(&hash_otp(otp), stored_hash) {
        return Err(AuthError::InvalidOtp);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: SecretString::from("k3Jd9xQ2mVp7Lr4tWz8bNc1fHy6gSa5E".to_string()),
            ttl_days: 30,
        }
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_password_garbage_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_generate_otp_format() {
        for _ in 0..100 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            let value: u32 = otp.parse().unwrap();
            assert!((100_000..1_000_000).contains(&value));
        }
    }

    #[test]
    fn test_hash_otp_is_sha256_hex() {
        assert_eq!(
            hash_otp("123456"),
            "8d969eef6ecad3c29a3a629280e686cf0c3f5d5a86aff3ca12020c923adc6c92"
        );
        assert_eq!(hash_otp(" 123456 "), hash_otp("123456"));
    }

    #[test]
    fn test_check_otp() {
        let now = Utc::now();
        let stored = hash_otp("482913");
        let later = Some(now + Duration::minutes(5));

        assert!(check_otp("482913", Some(&stored), later, now).is_ok());
        assert!(matches!(
            check_otp("482914", Some(&stored), later, now),
            Err(AuthError::InvalidOtp)
        ));
        assert!(matches!(
            check_otp("482913", Some(&stored), Some(now - Duration::seconds(1)), now),
            Err(AuthError::InvalidOtp)
        ));
        assert!(matches!(
            check_otp("482913", None, None, now),
            Err(AuthError::InvalidOtp)
        ));
    }

    #[test]
    fn test_token_roundtrip() {
        let config = jwt_config();
        let now = Utc::now();
        let token = issue_token(&config, UserId::new(42), UserRole::Admin, now).unwrap();

        let claims = decode_token(&config, &token).unwrap();
        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 60 * 60);
    }

    #[test]
    fn test_token_wrong_secret_rejected() {
        let token = issue_token(&jwt_config(), UserId::new(1), UserRole::User, Utc::now()).unwrap();
        let other = JwtConfig {
            secret: SecretString::from("Zp4Wq8Xr2Ls6Kd1Nf9Hb3Vc7Tg5Jm0Ye".to_string()),
            ttl_days: 30,
        };
        assert!(matches!(
            decode_token(&other, &token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = jwt_config();
        let issued = Utc::now() - Duration::days(31);
        let token = issue_token(&config, UserId::new(1), UserRole::User, issued).unwrap();
        assert!(matches!(
            decode_token(&config, &token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(decode_token(&jwt_config(), "not.a.jwt").is_err());
        assert!(decode_token(&jwt_config(), "").is_err());
    }

    #[test]
    fn test_claims_bad_subject() {
        let claims = Claims {
            sub: "abc".to_string(),
            role: UserRole::User,
            iat: 0,
            exp: 0,
        };
        assert!(matches!(claims.user_id(), Err(AuthError::InvalidToken(_))));
    }
}
