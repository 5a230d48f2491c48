//! Domain models for the storefront API.
//!
//! These types are what handlers return to clients. Database row types
//! live next to the queries in [`crate::db`].

pub mod cart;
pub mod catalog;
pub mod contact;
pub mod order;
pub mod user;

pub use cart::{Cart, CartItem, MAX_LINE_QUANTITY};
pub use catalog::{
    Availability, Category, NewProduct, Product, ProductFilter, ProductQuery, ProductUpdate,
};
pub use contact::{ContactMessage, NewContactMessage};
pub use order::{
    GatewayCheckout, Order, OrderCustomer, OrderItem, OrderedProduct, ShippingDetails,
    max_order_total,
};
pub use user::{AddressBook, User, UserSummary};
