//! Loomshop Core - Shared domain types.
//!
//! This crate provides the types used across all Loomshop components:
//! - `api` - The storefront REST API (products, cart, orders, payments)
//! - `cli` - Command-line tools for migrations, seeding and admin management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere, including from tests that never touch `PostgreSQL`.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, money, roles and order lifecycle statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
