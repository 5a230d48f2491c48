//! User repository for database operations.
//!
//! Creating a user also creates their (empty) cart in the same transaction,
//! so every account has exactly one cart from the start.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use loomshop_core::{Email, UserId, UserRole};

use super::{RepositoryError, conflict_or_database};
use crate::models::{AddressBook, User, UserSummary};

const USER_COLUMNS: &str = "id, name, email, mobile, role, \
     shipping_address_line1, shipping_address_line2, shipping_city, shipping_state, \
     shipping_postal_code, shipping_country, shipping_phone, \
     billing_address_line1, billing_address_line2, billing_city, billing_state, \
     billing_postal_code, billing_country, \
     created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    mobile: Option<String>,
    role: UserRole,
    #[sqlx(flatten)]
    addresses: AddressBook,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            mobile: row.mobile,
            role: row.role,
            addresses: row.addresses,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
    otp_hash: Option<String>,
    otp_expires_at: Option<DateTime<Utc>>,
}

/// A user together with their stored secrets, for login checks only.
#[derive(Debug)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<CredentialsRow> for UserCredentials {
    type Error = RepositoryError;

    fn try_from(row: CredentialsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user: row.user.try_into()?,
            password_hash: row.password_hash,
            otp_hash: row.otp_hash,
            otp_expires_at: row.otp_expires_at,
        })
    }
}

/// Fields for a new account.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a Email,
    pub mobile: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: UserRole,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM shop.user WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Find a user by email or mobile number, with their password hash and OTP.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the email in the database is invalid.
    pub async fn get_credentials(
        &self,
        identifier: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let identifier = identifier.trim();
        let sql = format!(
            "SELECT {USER_COLUMNS}, password_hash, otp_hash, otp_expires_at \
             FROM shop.user \
             WHERE email = lower($1) OR mobile = $1 \
             ORDER BY id \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, CredentialsRow>(&sql)
            .bind(identifier)
            .fetch_optional(self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get the password hash for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(&self, id: UserId) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT password_hash FROM shop.user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(hash)
    }

    /// Whether an email is registered to any user other than `except`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn email_taken(
        &self,
        email: &Email,
        except: Option<UserId>,
    ) -> Result<bool, RepositoryError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM shop.user WHERE email = $1 AND id IS DISTINCT FROM $2)",
        )
        .bind(email.as_str())
        .bind(except)
        .fetch_one(self.pool)
        .await?;

        Ok(taken)
    }

    /// Whether a mobile number is already registered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mobile_taken(&self, mobile: &str) -> Result<bool, RepositoryError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM shop.user WHERE mobile = $1)",
        )
        .bind(mobile)
        .fetch_one(self.pool)
        .await?;

        Ok(taken)
    }

    /// Create a user and their empty cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email or mobile already exists
    /// (the message names the conflicting field).
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser<'_>) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO shop.user (name, email, mobile, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(new.name)
            .bind(new.email.as_str())
            .bind(new.mobile)
            .bind(new.password_hash)
            .bind(new.role)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    let field = if db_err.constraint() == Some("user_mobile_key") {
                        "mobile"
                    } else {
                        "email"
                    };
                    return RepositoryError::Conflict(field.to_owned());
                }
                RepositoryError::Database(e)
            })?;

        sqlx::query("INSERT INTO shop.cart (user_id) VALUES ($1)")
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        row.try_into()
    }

    /// Create a user unless the email is already registered.
    ///
    /// Returns `None` when a user with that email exists (left untouched).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_if_absent(
        &self,
        new: &NewUser<'_>,
    ) -> Result<Option<User>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO shop.user (name, email, mobile, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(new.name)
            .bind(new.email.as_str())
            .bind(new.mobile)
            .bind(new.password_hash)
            .bind(new.role)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("INSERT INTO shop.cart (user_id) VALUES ($1)")
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        row.try_into().map(Some)
    }

    /// List all users for the admin console.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_summaries(&self) -> Result<Vec<UserSummary>, RepositoryError> {
        let users = sqlx::query_as::<_, UserSummary>(
            "SELECT id, name, email, role, created_at FROM shop.user ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(users)
    }

    /// Store a hashed one-time password with its expiry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_otp(
        &self,
        id: UserId,
        otp_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.user SET otp_hash = $2, otp_expires_at = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(otp_hash)
        .bind(expires_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Use up a pending one-time password.
    ///
    /// The OTP is cleared only if it is still the stored, unexpired one, in a
    /// single statement, so of two requests racing with the same code only
    /// one gets `true`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume_otp(&self, id: UserId, otp_hash: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.user SET otp_hash = NULL, otp_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND otp_hash = $2 AND otp_expires_at > NOW()",
        )
        .bind(id)
        .bind(otp_hash)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace a user's password hash, using up a pending one-time password.
    ///
    /// Returns `false` (and changes nothing) if the OTP is no longer the
    /// stored, unexpired one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reset_password(
        &self,
        id: UserId,
        otp_hash: &str,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.user \
             SET password_hash = $3, otp_hash = NULL, otp_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND otp_hash = $2 AND otp_expires_at > NOW()",
        )
        .bind(id)
        .bind(otp_hash)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace a user's password hash and clear any pending OTP.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.user \
             SET password_hash = $2, otp_hash = NULL, otp_expires_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Apply a partial profile update. `None` fields keep their stored value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the new email belongs to another user.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_profile(
        &self,
        id: UserId,
        name: Option<&str>,
        email: Option<&Email>,
        addresses: &AddressBook,
    ) -> Result<User, RepositoryError> {
        let sql = format!(
            "UPDATE shop.user SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                shipping_address_line1 = COALESCE($4, shipping_address_line1), \
                shipping_address_line2 = COALESCE($5, shipping_address_line2), \
                shipping_city = COALESCE($6, shipping_city), \
                shipping_state = COALESCE($7, shipping_state), \
                shipping_postal_code = COALESCE($8, shipping_postal_code), \
                shipping_country = COALESCE($9, shipping_country), \
                shipping_phone = COALESCE($10, shipping_phone), \
                billing_address_line1 = COALESCE($11, billing_address_line1), \
                billing_address_line2 = COALESCE($12, billing_address_line2), \
                billing_city = COALESCE($13, billing_city), \
                billing_state = COALESCE($14, billing_state), \
                billing_postal_code = COALESCE($15, billing_postal_code), \
                billing_country = COALESCE($16, billing_country), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(name)
            .bind(email.map(Email::as_str))
            .bind(addresses.shipping_address_line1.as_deref())
            .bind(addresses.shipping_address_line2.as_deref())
            .bind(addresses.shipping_city.as_deref())
            .bind(addresses.shipping_state.as_deref())
            .bind(addresses.shipping_postal_code.as_deref())
            .bind(addresses.shipping_country.as_deref())
            .bind(addresses.shipping_phone.as_deref())
            .bind(addresses.billing_address_line1.as_deref())
            .bind(addresses.billing_address_line2.as_deref())
            .bind(addresses.billing_city.as_deref())
            .bind(addresses.billing_state.as_deref())
            .bind(addresses.billing_postal_code.as_deref())
            .bind(addresses.billing_country.as_deref())
            .fetch_optional(self.pool)
            .await
            .map_err(|e| conflict_or_database(e, "email already in use"))?
            .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a user (their cart goes with them).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the user has placed orders.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.user WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| conflict_or_database(e, "user has orders"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
