//! Shopping cart domain types.

use rust_decimal::Decimal;
use serde::Serialize;

use loomshop_core::{CartId, CartItemId, ProductId, UserId};

use super::Product;

/// Most units of one product and size a cart line can hold. Merged adds are
/// capped here.
pub const MAX_LINE_QUANTITY: i32 = 1_000;

/// A user's cart with its line items.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
}

/// A cart line: one product in one size.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub size: Option<String>,
    pub product: Product,
}

impl Cart {
    /// Sum of current unit price times quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.product.price * Decimal::from(item.quantity))
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use loomshop_core::CategoryId;

    use super::*;
    use crate::models::Category;

    fn product(id: i32, price: Decimal) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: String::new(),
            price,
            stock: 10,
            images: Vec::new(),
            category_id: CategoryId::new(1),
            category: Category {
                id: CategoryId::new(1),
                name: "Shirts".to_string(),
                created_at: now,
            },
            color: None,
            sizes: vec!["M".to_string()],
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(id: i32, price: Decimal, quantity: i32) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            product_id: ProductId::new(id),
            quantity,
            size: Some("M".to_string()),
            product: product(id, price),
        }
    }

    #[test]
    fn test_total_uses_decimal_arithmetic() {
        let cart = Cart {
            id: CartId::new(1),
            user_id: UserId::new(1),
            items: vec![
                item(1, Decimal::new(1999, 2), 3),
                item(2, Decimal::new(10, 2), 7),
            ],
        };
        assert_eq!(cart.total(), Decimal::new(6067, 2));
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart {
            id: CartId::new(1),
            user_id: UserId::new(1),
            items: Vec::new(),
        };
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
    }
}
