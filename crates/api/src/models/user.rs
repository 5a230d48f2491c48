//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loomshop_core::{Email, UserId, UserRole};

/// Saved shipping and billing addresses.
///
/// Every field is optional; the same shape is used for partial profile
/// updates, where `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AddressBook {
    pub shipping_address_line1: Option<String>,
    pub shipping_address_line2: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_state: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub shipping_phone: Option<String>,
    pub billing_address_line1: Option<String>,
    pub billing_address_line2: Option<String>,
    pub billing_city: Option<String>,
    pub billing_state: Option<String>,
    pub billing_postal_code: Option<String>,
    pub billing_country: Option<String>,
}

/// A shop account (domain type).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub mobile: Option<String>,
    pub role: UserRole,
    #[serde(flatten)]
    pub addresses: AddressBook,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User listing entry for the admin console.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}
