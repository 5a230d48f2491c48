//! Order repository.
//!
//! Every state change that spans more than one row runs in a transaction:
//! - checkout locks the cart, inserts the order and its items from the locked
//!   lines, and (for COD) removes exactly those lines;
//! - a captured payment moves the order out of `PENDING` and clears the cart,
//!   and only the delivery that wins the `PENDING` guard does so;
//! - admin status changes lock the row before validating the transition.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use loomshop_core::{CartId, OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, UserId};

use super::RepositoryError;
use super::carts::lock_cart;
use crate::models::{Order, OrderCustomer, OrderItem, OrderedProduct, ShippingDetails};

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.total_amount, o.status, o.payment_method, \
     o.razorpay_order_id, o.razorpay_payment_id, \
     o.full_name, o.phone, o.address_line1, o.address_line2, o.city, o.state, \
     o.postal_code, o.country, o.created_at, o.updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total_amount: Decimal,
    status: OrderStatus,
    payment_method: PaymentMethod,
    razorpay_order_id: Option<String>,
    razorpay_payment_id: Option<String>,
    #[sqlx(flatten)]
    shipping: ShippingDetails,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>, user: Option<OrderCustomer>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            total_amount: self.total_amount,
            status: self.status,
            payment_method: self.payment_method,
            razorpay_order_id: self.razorpay_order_id,
            razorpay_payment_id: self.razorpay_payment_id,
            shipping: self.shipping,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
            user,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderWithCustomerRow {
    #[sqlx(flatten)]
    order: OrderRow,
    customer_name: String,
    customer_email: String,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
    price: Decimal,
    size: Option<String>,
    product_name: String,
    product_images: Vec<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            price: row.price,
            size: row.size,
            product: OrderedProduct {
                id: row.product_id,
                name: row.product_name,
                images: row.product_images,
            },
        }
    }
}

/// Group item rows under their orders, preserving order row order.
fn attach_items(
    orders: Vec<(OrderRow, Option<OrderCustomer>)>,
    items: Vec<OrderItemRow>,
) -> Vec<Order> {
    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item.into());
    }

    orders
        .into_iter()
        .map(|(row, user)| {
            let items = by_order.remove(&row.id).unwrap_or_default();
            row.into_order(items, user)
        })
        .collect()
}

/// Fields for a new order.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub user_id: UserId,
    pub cart_id: CartId,
    /// Total the customer was quoted (and, for online orders, asked to pay).
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub razorpay_order_id: Option<&'a str>,
    pub shipping: &'a ShippingDetails,
}

/// Why checkout could not turn the cart into an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing left in the cart once it was locked.
    #[error("cart is empty")]
    EmptyCart,

    /// The locked cart no longer adds up to the quoted total.
    #[error("cart total changed from {quoted} to {current}")]
    CartChanged { quoted: Decimal, current: Decimal },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Result of the first successful capture of a gateway payment.
#[derive(Debug, Clone)]
pub struct PaymentCapture {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_amount: Decimal,
    pub customer_name: String,
    pub customer_email: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order from the contents of a cart.
    ///
    /// The cart and its lines stay locked until commit, so the order holds
    /// exactly the lines that were priced, and a concurrent checkout of the
    /// same cart waits and then sees what this one left behind.
    /// Cash-on-delivery orders remove the ordered lines in the same
    /// transaction; online orders keep them until the payment is captured.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if the locked cart has no lines.
    /// Returns `CheckoutError::CartChanged` if the locked lines no longer add
    /// up to `total_amount`.
    /// Returns `CheckoutError::Repository` if any statement fails (nothing is written).
    pub async fn create(&self, new: &NewOrder<'_>) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        let cart = lock_cart(&mut *tx, new.cart_id, new.user_id)
            .await?
            .filter(|cart| !cart.is_empty())
            .ok_or(CheckoutError::EmptyCart)?;
        let current = cart.total();
        if current != new.total_amount {
            return Err(CheckoutError::CartChanged {
                quoted: new.total_amount,
                current,
            });
        }

        let sql = format!(
            "INSERT INTO shop.order AS o \
                (user_id, total_amount, status, payment_method, razorpay_order_id, \
                 full_name, phone, address_line1, address_line2, city, state, postal_code, country) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {ORDER_COLUMNS}"
        );
        let shipping = new.shipping;
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(new.user_id)
            .bind(current)
            .bind(OrderStatus::Pending)
            .bind(new.payment_method)
            .bind(new.razorpay_order_id)
            .bind(shipping.full_name.trim())
            .bind(shipping.phone.trim())
            .bind(shipping.address_line1.trim())
            .bind(shipping.address_line2.as_deref().map(str::trim))
            .bind(shipping.city.trim())
            .bind(shipping.state.trim())
            .bind(shipping.postal_code.trim())
            .bind(shipping.country.trim())
            .fetch_one(&mut *tx)
            .await?;

        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let item_id = sqlx::query_scalar::<_, OrderItemId>(
                "INSERT INTO shop.order_item (order_id, product_id, quantity, price, size) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id",
            )
            .bind(row.id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.product.price)
            .bind(line.size.as_deref())
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderItem {
                id: item_id,
                order_id: row.id,
                product_id: line.product_id,
                quantity: line.quantity,
                price: line.product.price,
                size: line.size.clone(),
                product: OrderedProduct {
                    id: line.product_id,
                    name: line.product.name.clone(),
                    images: line.product.images.clone(),
                },
            });
        }

        if new.payment_method == PaymentMethod::Cod {
            let ordered: Vec<i32> = cart.items.iter().map(|line| line.id.as_i32()).collect();
            sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1 AND id = ANY($2)")
                .bind(cart.id)
                .bind(ordered)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(row.into_order(items, None))
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM shop.order o WHERE o.id = $1");
        let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        let items = self.items_for(&[row.id]).await?;
        Ok(attach_items(vec![(row, None)], items).pop())
    }

    /// A user's orders with items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM shop.order o \
             WHERE o.user_id = $1 \
             ORDER BY o.created_at DESC, o.id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;

        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let items = self.items_for(&ids).await?;
        Ok(attach_items(
            rows.into_iter().map(|r| (r, None)).collect(),
            items,
        ))
    }

    /// Every order with its customer and items, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS}, u.name AS customer_name, u.email AS customer_email \
             FROM shop.order o \
             JOIN shop.user u ON u.id = o.user_id \
             ORDER BY o.created_at DESC, o.id DESC"
        );
        let rows = sqlx::query_as::<_, OrderWithCustomerRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        let ids: Vec<OrderId> = rows.iter().map(|r| r.order.id).collect();
        let items = self.items_for(&ids).await?;
        let orders = rows
            .into_iter()
            .map(|r| {
                let customer = OrderCustomer {
                    id: r.order.user_id,
                    name: r.customer_name,
                    email: r.customer_email,
                };
                (r.order, Some(customer))
            })
            .collect();
        Ok(attach_items(orders, items))
    }

    /// Move an order to a new status, enforcing the lifecycle rules for its
    /// payment method.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` if the transition is not allowed.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (current, method) = sqlx::query_as::<_, (OrderStatus, PaymentMethod)>(
            "SELECT status, payment_method FROM shop.order WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if current.is_terminal() {
            return Err(RepositoryError::Conflict(format!(
                "order is already {current} and can no longer change"
            )));
        }
        if !current.can_transition_to(next, method) {
            return Err(RepositoryError::Conflict(format!(
                "cannot change a {method} order from {current} to {next}"
            )));
        }

        let sql = format!(
            "UPDATE shop.order o SET status = $2, updated_at = NOW() \
             WHERE o.id = $1 \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(next)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let items = self.items_for(&[row.id]).await?;
        attach_items(vec![(row, None)], items)
            .pop()
            .ok_or(RepositoryError::NotFound)
    }

    /// Record a captured gateway payment.
    ///
    /// Only an order still `PENDING` is updated; when that happens the
    /// customer's cart is emptied in the same transaction. Returns `None` when
    /// no order was updated (unknown gateway order, or a repeated delivery).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails (nothing is written).
    pub async fn mark_paid(
        &self,
        razorpay_order_id: &str,
        razorpay_payment_id: &str,
    ) -> Result<Option<PaymentCapture>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let captured = sqlx::query_as::<_, (OrderId, UserId, Decimal, String, String)>(
            "UPDATE shop.order o \
             SET status = $3, razorpay_payment_id = $2, updated_at = NOW() \
             FROM shop.user u \
             WHERE u.id = o.user_id AND o.razorpay_order_id = $1 AND o.status = $4 \
             RETURNING o.id, o.user_id, o.total_amount, u.name, u.email",
        )
        .bind(razorpay_order_id)
        .bind(razorpay_payment_id)
        .bind(OrderStatus::Paid)
        .bind(OrderStatus::Pending)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((order_id, user_id, total_amount, customer_name, customer_email)) = captured
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "DELETE FROM shop.cart_item \
             WHERE cart_id IN (SELECT id FROM shop.cart WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(PaymentCapture {
            order_id,
            user_id,
            total_amount,
            customer_name,
            customer_email,
        }))
    }

    /// Record a failed gateway payment. Only a `PENDING` order is changed.
    ///
    /// Returns whether an order was updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_failed(&self, razorpay_order_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.order SET status = $2, updated_at = NOW() \
             WHERE razorpay_order_id = $1 AND status = $3",
        )
        .bind(razorpay_order_id)
        .bind(OrderStatus::Failed)
        .bind(OrderStatus::Pending)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn items_for(&self, order_ids: &[OrderId]) -> Result<Vec<OrderItemRow>, RepositoryError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = order_ids.iter().map(OrderId::as_i32).collect();

        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.price, oi.size, \
                    p.name AS product_name, p.images AS product_images \
             FROM shop.order_item oi \
             JOIN shop.product p ON p.id = oi.product_id \
             WHERE oi.order_id = ANY($1) \
             ORDER BY oi.id",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_row(id: i32) -> OrderRow {
        let now = Utc::now();
        OrderRow {
            id: OrderId::new(id),
            user_id: UserId::new(1),
            total_amount: Decimal::new(50_000, 2),
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::Cod,
            razorpay_order_id: None,
            razorpay_payment_id: None,
            shipping: ShippingDetails {
                full_name: "Meera Iyer".to_string(),
                phone: "9000000001".to_string(),
                address_line1: "12 MG Road".to_string(),
                address_line2: None,
                city: "Bengaluru".to_string(),
                state: "Karnataka".to_string(),
                postal_code: "560001".to_string(),
                country: "India".to_string(),
            },
            created_at: now,
            updated_at: now,
        }
    }

    fn item_row(id: i32, order_id: i32) -> OrderItemRow {
        OrderItemRow {
            id: OrderItemId::new(id),
            order_id: OrderId::new(order_id),
            product_id: ProductId::new(9),
            quantity: 1,
            price: Decimal::new(50_000, 2),
            size: None,
            product_name: "Cotton kurta".to_string(),
            product_images: Vec::new(),
        }
    }

    #[test]
    fn test_attach_items_groups_by_order() {
        let orders = attach_items(
            vec![(order_row(2), None), (order_row(1), None), (order_row(3), None)],
            vec![item_row(10, 1), item_row(11, 2), item_row(12, 1)],
        );

        let ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(orders[0].items.len(), 1);
        assert_eq!(orders[1].items.len(), 2);
        assert!(orders[2].items.is_empty());
        assert_eq!(orders[1].items[0].product.name, "Cotton kurta");
    }
}
