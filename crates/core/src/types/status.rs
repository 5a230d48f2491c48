//! Status and classification enums for shop entities.
//!
//! The order lifecycle is the only state machine in the system, and its
//! shape depends on how the order is paid:
//!
//! ```text
//! RAZORPAY   PENDING ───► PAID ───► SHIPPED ───► DELIVERED
//!               │           │
//!               │           └─────► CANCELLED
//!               ├───────────────────► CANCELLED
//!               └───────────────────► FAILED
//!
//! COD        PENDING ───► SHIPPED ───► DELIVERED
//!               └───────► CANCELLED
//! ```
//!
//! Online orders normally leave `PENDING` through the gateway webhook and
//! cannot ship before the payment is captured.
//! Cash-on-delivery orders are never `PAID` or `FAILED`: the cash is
//! collected on delivery.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, awaiting payment (online) or dispatch (COD).
    #[default]
    Pending,
    /// Payment captured by the gateway.
    Paid,
    /// Payment attempt failed at the gateway.
    Failed,
    /// Cancelled by an admin before shipping.
    Cancelled,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Paid,
        Self::Failed,
        Self::Cancelled,
        Self::Shipped,
        Self::Delivered,
    ];

    /// Whether an order in this status, paid by `method`, may move to `next`.
    ///
    /// Same-status updates are not transitions and return `false`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self, method: PaymentMethod) -> bool {
        match method {
            PaymentMethod::Razorpay => matches!(
                (self, next),
                (Self::Pending, Self::Paid | Self::Failed | Self::Cancelled)
                    | (Self::Paid, Self::Shipped | Self::Cancelled)
                    | (Self::Shipped, Self::Delivered)
            ),
            PaymentMethod::Cod => matches!(
                (self, next),
                (Self::Pending, Self::Shipped | Self::Cancelled) | (Self::Shipped, Self::Delivered)
            ),
        }
    }

    /// Terminal statuses accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Delivered)
    }

    /// Wire representation (matches the JSON and database enum labels).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.payment_method", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cod,
    /// Online payment through the Razorpay gateway.
    Razorpay,
}

impl PaymentMethod {
    /// Whether the order needs a gateway round-trip before it is paid.
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Razorpay)
    }

    /// Wire representation (matches the JSON and database enum labels).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cod => "COD",
            Self::Razorpay => "RAZORPAY",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Regular shopper.
    #[default]
    User,
    /// Store management (products, categories, orders, messages).
    Admin,
    /// Everything an admin can do plus managing other admins.
    SuperAdmin,
}

impl UserRole {
    /// Whether this role may use the admin endpoints.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
            Self::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    Newest,
    /// Featured products are currently the newest ones.
    Featured,
}

impl std::str::FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "newest" => Ok(Self::Newest),
            "featured" => Ok(Self::Featured),
            _ => Err(format!("invalid sort: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const METHODS: [PaymentMethod; 2] = [PaymentMethod::Cod, PaymentMethod::Razorpay];

    #[test]
    fn test_online_pending_transitions() {
        let from = OrderStatus::Pending;
        let online = PaymentMethod::Razorpay;
        assert!(from.can_transition_to(OrderStatus::Paid, online));
        assert!(from.can_transition_to(OrderStatus::Failed, online));
        assert!(from.can_transition_to(OrderStatus::Cancelled, online));
        assert!(!from.can_transition_to(OrderStatus::Shipped, online));
        assert!(!from.can_transition_to(OrderStatus::Delivered, online));
    }

    #[test]
    fn test_cod_pending_transitions() {
        let from = OrderStatus::Pending;
        let cod = PaymentMethod::Cod;
        assert!(from.can_transition_to(OrderStatus::Shipped, cod));
        assert!(from.can_transition_to(OrderStatus::Cancelled, cod));
        assert!(!from.can_transition_to(OrderStatus::Paid, cod));
        assert!(!from.can_transition_to(OrderStatus::Failed, cod));
        assert!(!from.can_transition_to(OrderStatus::Delivered, cod));
    }

    #[test]
    fn test_paid_and_shipped_transitions() {
        let online = PaymentMethod::Razorpay;
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Shipped, online));
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled, online));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Pending, online));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Failed, online));

        for method in METHODS {
            assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered, method));
            assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled, method));
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for method in METHODS {
            for terminal in OrderStatus::ALL.into_iter().filter(|s| s.is_terminal()) {
                for next in OrderStatus::ALL {
                    assert!(
                        !terminal.can_transition_to(next, method),
                        "{terminal} must not move to {next}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_no_status_transitions_to_itself() {
        for method in METHODS {
            for status in OrderStatus::ALL {
                assert!(!status.can_transition_to(status, method));
            }
        }
    }

    #[test]
    fn test_order_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
        assert_eq!("delivered".parse::<OrderStatus>().unwrap(), OrderStatus::Delivered);
        assert!("LOST".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_payment_method_wire_format() {
        assert_eq!(
            serde_json::from_str::<PaymentMethod>("\"RAZORPAY\"").unwrap(),
            PaymentMethod::Razorpay
        );
        assert_eq!(serde_json::to_string(&PaymentMethod::Cod).unwrap(), "\"COD\"");
        assert!(PaymentMethod::Razorpay.is_online());
        assert!(!PaymentMethod::Cod.is_online());
        assert_eq!(PaymentMethod::Razorpay.to_string(), "RAZORPAY");
    }

    #[test]
    fn test_user_role() {
        assert!(!UserRole::User.is_admin());
        assert!(UserRole::Admin.is_admin());
        assert!(UserRole::SuperAdmin.is_admin());
        assert_eq!(
            serde_json::to_string(&UserRole::SuperAdmin).unwrap(),
            "\"SUPER_ADMIN\""
        );
        assert_eq!("super_admin".parse::<UserRole>().unwrap(), UserRole::SuperAdmin);
        assert_eq!(UserRole::Admin.to_string(), "admin");
        assert!("owner".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_product_sort_parse() {
        assert_eq!("price_asc".parse::<ProductSort>().unwrap(), ProductSort::PriceAsc);
        assert_eq!("featured".parse::<ProductSort>().unwrap(), ProductSort::Featured);
        assert!("cheapest".parse::<ProductSort>().is_err());
    }
}
