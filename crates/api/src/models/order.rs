//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomshop_core::{OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, UserId};

/// Largest total an order can carry (`NUMERIC(12, 2)`).
#[must_use]
pub fn max_order_total() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Shipping details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl ShippingDetails {
    /// # Errors
    ///
    /// Returns a client-facing message when a required field is blank.
    pub fn validate(&self) -> Result<(), &'static str> {
        let required = [
            &self.full_name,
            &self.phone,
            &self.address_line1,
            &self.city,
            &self.state,
            &self.postal_code,
            &self.country,
        ];
        if required.iter().any(|field| field.trim().is_empty()) {
            return Err("Please provide complete shipping details");
        }
        Ok(())
    }
}

/// Customer fields shown with an order in the admin console.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCustomer {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// Product fields shown with an order line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedProduct {
    pub id: ProductId,
    pub name: String,
    pub images: Vec<String>,
}

/// An order line with the unit price captured at checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub price: Decimal,
    pub size: Option<String>,
    pub product: OrderedProduct,
}

/// A placed order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<OrderCustomer>,
}

/// What the browser needs to open the Razorpay checkout for an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCheckout {
    pub order_id: OrderId,
    pub razorpay_order_id: String,
    pub amount: Decimal,
    pub currency: &'static str,
    pub key_id: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_details_from_checkout_body() {
        let details: ShippingDetails = serde_json::from_str(
            r#"{
                "fullName": "Meera Iyer",
                "phone": "9000000001",
                "addressLine1": "12 MG Road",
                "city": "Bengaluru",
                "state": "Karnataka",
                "postalCode": "560001",
                "country": "India"
            }"#,
        )
        .unwrap();
        assert!(details.address_line2.is_none());
        assert!(details.validate().is_ok());
    }

    #[test]
    fn test_shipping_details_missing_city() {
        let details: ShippingDetails =
            serde_json::from_str(r#"{"fullName":"Meera Iyer","phone":"9000000001"}"#).unwrap();
        assert!(details.validate().is_err());
    }

    #[test]
    fn test_gateway_checkout_serialization() {
        let checkout = GatewayCheckout {
            order_id: OrderId::new(42),
            razorpay_order_id: "order_Nx1".to_string(),
            amount: Decimal::new(129_900, 2),
            currency: loomshop_core::CURRENCY,
            key_id: "rzp_test_key".to_string(),
        };
        let json = serde_json::to_value(&checkout).unwrap();
        assert_eq!(json["orderId"], 42);
        assert_eq!(json["razorpayOrderId"], "order_Nx1");
        assert_eq!(json["amount"], "1299.00");
        assert_eq!(json["currency"], "INR");
        assert_eq!(json["keyId"], "rzp_test_key");
    }
}
