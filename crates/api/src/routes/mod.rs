//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited)
//! POST   /api/auth/register          - Create account, returns token
//! POST   /api/auth/login             - Password or OTP login, returns token
//! POST   /api/auth/send-otp          - Email/text a one-time password
//! POST   /api/auth/reset-password    - New password via OTP
//! PUT    /api/auth/change-password   - New password via old password (auth)
//! GET    /api/auth/me                - Current profile (auth)
//!
//! # Catalog
//! GET    /api/products               - Filtered listing (cached)
//! GET    /api/products/{id}          - Product detail
//! POST   /api/products               - Create (admin)
//! PUT    /api/products/{id}          - Partial update (admin)
//! DELETE /api/products/{id}          - Delete (admin)
//! GET    /api/categories             - Category list
//! POST   /api/categories             - Create (admin)
//! DELETE /api/categories/{id}        - Delete (admin)
//!
//! # Cart (auth)
//! GET    /api/cart                   - Current cart
//! POST   /api/cart                   - Add item
//! PUT    /api/cart/{item_id}         - Set quantity
//! DELETE /api/cart/{item_id}         - Remove item
//!
//! # Orders (auth)
//! POST   /api/orders                 - Checkout (COD or Razorpay)
//! GET    /api/orders/myorders        - Caller's orders
//! GET    /api/orders                 - All orders (admin)
//! PUT    /api/orders/{id}            - Change status (admin)
//!
//! # Payment
//! POST   /api/payment/verify         - Check checkout signature (auth)
//! POST   /api/payment/webhook        - Gateway events (HMAC signed)
//!
//! # Users (auth)
//! GET    /api/users                  - All accounts (admin)
//! POST   /api/users/admin            - Create admin (super admin)
//! PUT    /api/users/me               - Update own profile
//! DELETE /api/users/{id}             - Delete account (super admin)
//!
//! # Contact
//! POST   /api/contacts               - Submit message
//! GET    /api/contacts               - All messages (admin)
//! ```

pub mod auth;
pub mod cart;
pub mod categories;
pub mod contacts;
pub mod orders;
pub mod payment;
pub mod products;
pub mod users;

use axum::{
    Router,
    http::Uri,
    routing::{get, post, put},
};

use crate::db::RepositoryError;
use crate::error::AppError;
use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the `/api` router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/payment", payment_routes())
        .nest("/users", user_routes())
        .nest("/contacts", contact_routes())
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/send-otp", post(auth::send_otp))
        .route("/reset-password", post(auth::reset_password))
        .route("/change-password", put(auth::change_password))
        .route("/me", get(auth::me))
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::list).post(categories::create))
        .route("/{id}", axum::routing::delete(categories::delete))
}

fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add_item))
        .route(
            "/{item_id}",
            put(cart::update_item).delete(cart::remove_item),
        )
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list).post(orders::create))
        .route("/myorders", get(orders::mine))
        .route("/{id}", put(orders::update_status))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/verify", post(payment::verify))
        .route("/webhook", post(payment::webhook))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(users::list))
        .route("/admin", post(users::create_admin))
        .route("/me", put(users::update_profile))
        .route("/{id}", axum::routing::delete(users::delete))
}

fn contact_routes() -> Router<AppState> {
    Router::new().route("/", get(contacts::list).post(contacts::create))
}

/// JSON 404 for any unmatched path.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Not Found - {}", uri.path()))
}

/// Give a repository `NotFound` a resource-specific message.
pub(crate) fn not_found_as(err: RepositoryError, message: &str) -> AppError {
    match err {
        RepositoryError::NotFound => AppError::NotFound(message.to_string()),
        other => other.into(),
    }
}
