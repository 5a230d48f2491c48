//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with method, path, request and user IDs)
//! 3. Request ID (propagate or generate `x-request-id`)
//! 4. Security headers
//! 5. CORS and the request body limit
//! 6. Rate limiting on `/api/auth` (governor)
//!
//! Authentication is not a layer: handlers opt in with the extractors in
//! [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{RequireAdmin, RequireAuth, RequireSuperAdmin};
pub use rate_limit::auth_rate_limiter;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::security_headers_middleware;
