//! Contact message repository.

use sqlx::PgPool;

use super::RepositoryError;
use crate::models::{ContactMessage, NewContactMessage};

/// Repository for contact form submissions.
pub struct ContactRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ContactRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a contact form submission.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, msg: &NewContactMessage) -> Result<ContactMessage, RepositoryError> {
        let phone = msg
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let message = sqlx::query_as::<_, ContactMessage>(
            "INSERT INTO shop.contact_message (name, email, phone, subject, message) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, name, email, phone, subject, message, created_at",
        )
        .bind(msg.name.trim())
        .bind(msg.email.trim())
        .bind(phone)
        .bind(msg.subject.trim())
        .bind(msg.message.trim())
        .fetch_one(self.pool)
        .await?;

        Ok(message)
    }

    /// List all messages, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ContactMessage>, RepositoryError> {
        let messages = sqlx::query_as::<_, ContactMessage>(
            "SELECT id, name, email, phone, subject, message, created_at \
             FROM shop.contact_message \
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(messages)
    }
}
