//! Database operations for the shop `PostgreSQL` database.
//!
//! ## Tables (schema `shop`)
//!
//! - `user` - Accounts, password hashes, pending OTPs and saved addresses
//! - `category`, `product` - Catalog
//! - `cart`, `cart_item` - One cart per user
//! - `order`, `order_item` - Placed orders with price snapshots
//! - `contact_message` - Contact form submissions
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p loomshop-cli -- migrate
//! ```

/// Product columns joined with their category (`p` and `c` aliases), in the
/// shape `products::ProductRow` expects.
macro_rules! product_columns {
    () => {
        "p.id, p.name, p.description, p.price, p.stock, p.images, p.category_id, \
         p.color, p.sizes, p.active, p.created_at, p.updated_at, \
         c.name AS category_name, c.created_at AS category_created_at"
    };
}

pub mod carts;
pub mod categories;
pub mod contacts;
pub mod orders;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use contacts::ContactRepository;
pub use orders::{CheckoutError, NewOrder, OrderRepository, PaymentCapture};
pub use products::ProductRepository;
pub use users::{NewUser, UserCredentials, UserRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email, row still referenced).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map unique and foreign-key violations to `Conflict`, everything else to `Database`.
pub(crate) fn conflict_or_database(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
