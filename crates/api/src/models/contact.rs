//! Contact form messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loomshop_core::ContactMessageId;

/// A stored contact form submission.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: ContactMessageId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Contact form submission body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewContactMessage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

impl NewContactMessage {
    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message when a required field is blank.
    pub fn validate(&self) -> Result<(), &'static str> {
        let required = [&self.name, &self.email, &self.subject, &self.message];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err("Please provide all required fields");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> NewContactMessage {
        NewContactMessage {
            name: "Ravi".to_string(),
            email: "ravi@example.in".to_string(),
            phone: None,
            subject: "Sizing".to_string(),
            message: "Does the kurta run small?".to_string(),
        }
    }

    #[test]
    fn test_complete_message_is_valid() {
        assert!(message().validate().is_ok());
    }

    #[test]
    fn test_blank_subject_is_rejected() {
        let mut msg = message();
        msg.subject = "   ".to_string();
        assert!(msg.validate().is_err());
    }
}
