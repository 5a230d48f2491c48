//! Cart repository.
//!
//! Item mutations are scoped to the owner's cart in SQL, so an item ID from
//! someone else's cart behaves exactly like a missing one.

use sqlx::{PgConnection, PgPool};

use loomshop_core::{CartId, CartItemId, ProductId, UserId};

use super::RepositoryError;
use super::products::ProductRow;
use crate::models::{Cart, CartItem, MAX_LINE_QUANTITY};

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    item_id: CartItemId,
    quantity: i32,
    size: Option<String>,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        let product: crate::models::Product = row.product.into();
        Self {
            id: row.item_id,
            product_id: product.id,
            quantity: row.quantity,
            size: row.size,
            product,
        }
    }
}

/// Cart lines with their products for cart `$1`, oldest first.
macro_rules! cart_items_sql {
    ($suffix:literal) => {
        concat!(
            "SELECT ci.id AS item_id, ci.quantity, ci.size, ",
            product_columns!(),
            " FROM shop.cart_item ci \
              JOIN shop.product p ON p.id = ci.product_id \
              JOIN shop.category c ON c.id = p.category_id \
              WHERE ci.cart_id = $1 \
              ORDER BY ci.id",
            $suffix
        )
    };
}

/// Trim a size label; blank means "no size".
fn normalize_size(size: Option<&str>) -> Option<&str> {
    size.map(str::trim).filter(|s| !s.is_empty())
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's cart, creating it on first access.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        let cart_id = self.ensure_cart(user_id).await?;
        let items = self.items(cart_id).await?;

        Ok(Cart {
            id: cart_id,
            user_id,
            items,
        })
    }

    /// Add a product to the cart. An existing line for the same product and
    /// size has its quantity increased instead, up to [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
        size: Option<&str>,
    ) -> Result<Cart, RepositoryError> {
        let cart_id = self.ensure_cart(user_id).await?;

        sqlx::query(
            "INSERT INTO shop.cart_item (cart_id, product_id, quantity, size) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT cart_item_cart_product_size_key \
             DO UPDATE SET quantity = LEAST(shop.cart_item.quantity + EXCLUDED.quantity, $5)",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(normalize_size(size))
        .bind(MAX_LINE_QUANTITY)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        self.get_or_create(user_id).await
    }

    /// Set the quantity of one of the user's cart items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item is not in the user's cart.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<Cart, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.cart_item ci SET quantity = $3 \
             FROM shop.cart c \
             WHERE ci.cart_id = c.id AND c.user_id = $1 AND ci.id = $2",
        )
        .bind(user_id)
        .bind(item_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_or_create(user_id).await
    }

    /// Remove one of the user's cart items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item is not in the user's cart.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<Cart, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM shop.cart_item ci \
             USING shop.cart c \
             WHERE ci.cart_id = c.id AND c.user_id = $1 AND ci.id = $2",
        )
        .bind(user_id)
        .bind(item_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_or_create(user_id).await
    }

    async fn ensure_cart(&self, user_id: UserId) -> Result<CartId, RepositoryError> {
        let id = sqlx::query_scalar::<_, CartId>(
            "INSERT INTO shop.cart (user_id) VALUES ($1) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING id",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    async fn items(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(cart_items_sql!(""))
            .bind(cart_id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Lock a user's cart and its lines for the rest of the transaction.
///
/// Returns `None` when the cart does not belong to the user. Concurrent
/// adds, quantity changes and removals on this cart wait until the
/// transaction ends.
pub(super) async fn lock_cart(
    conn: &mut PgConnection,
    cart_id: CartId,
    user_id: UserId,
) -> Result<Option<Cart>, sqlx::Error> {
    let locked = sqlx::query_scalar::<_, CartId>(
        "SELECT id FROM shop.cart WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(cart_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    if locked.is_none() {
        return Ok(None);
    }

    let rows = sqlx::query_as::<_, CartItemRow>(cart_items_sql!(" FOR UPDATE OF ci"))
        .bind(cart_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(Some(Cart {
        id: cart_id,
        user_id,
        items: rows.into_iter().map(Into::into).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_size() {
        assert_eq!(normalize_size(Some(" M ")), Some("M"));
        assert_eq!(normalize_size(Some("  ")), None);
        assert_eq!(normalize_size(None), None);
    }
}
