//! Product repository.
//!
//! Listing queries are assembled with `QueryBuilder` from a normalised
//! [`ProductFilter`]; every value is bound, never interpolated.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};

use loomshop_core::{CategoryId, ProductId, ProductSort};

use super::{CategoryRepository, RepositoryError, conflict_or_database};
use crate::models::{Availability, Category, NewProduct, Product, ProductFilter, ProductUpdate};

/// Row shape produced by `product_columns!()`.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    images: Vec<String>,
    category_id: CategoryId,
    color: Option<String>,
    sizes: Vec<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    category_name: String,
    category_created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            images: row.images,
            category_id: row.category_id,
            category: Category {
                id: row.category_id,
                name: row.category_name,
                created_at: row.category_created_at,
            },
            color: row.color,
            sizes: row.sizes,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `ORDER BY` clause for a listing sort.
const fn order_clause(sort: Option<ProductSort>) -> &'static str {
    match sort {
        Some(ProductSort::PriceAsc) => " ORDER BY p.price ASC, p.id ASC",
        Some(ProductSort::PriceDesc) => " ORDER BY p.price DESC, p.id ASC",
        Some(ProductSort::Newest | ProductSort::Featured) => {
            " ORDER BY p.created_at DESC, p.id DESC"
        }
        None => " ORDER BY p.id ASC",
    }
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching a filter.
    ///
    /// A category name that matches no category is ignored rather than
    /// producing an empty listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let category_id = match &filter.category {
            Some(name) => CategoryRepository::new(self.pool).find_id_by_name(name).await?,
            None => None,
        };

        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(concat!(
            "SELECT ",
            product_columns!(),
            " FROM shop.product p JOIN shop.category c ON c.id = p.category_id WHERE TRUE"
        ));

        if let Some(id) = category_id {
            qb.push(" AND p.category_id = ").push_bind(id);
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(active) = filter.active {
            qb.push(" AND p.active = ").push_bind(active);
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND p.price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND p.price <= ").push_bind(max);
        }
        if let Some(color) = &filter.color {
            qb.push(" AND lower(p.color) = ").push_bind(color.clone());
        }
        if !filter.sizes.is_empty() {
            qb.push(" AND p.sizes && ").push_bind(filter.sizes.clone());
        }
        match filter.availability {
            Some(Availability::InStock) => {
                qb.push(" AND p.stock > 0");
            }
            Some(Availability::OutOfStock) => {
                qb.push(" AND p.stock = 0");
            }
            None => {}
        }
        qb.push(order_clause(filter.sort));

        let rows = qb
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM shop.product p JOIN shop.category c ON c.id = p.category_id WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the category does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewProduct) -> Result<Product, RepositoryError> {
        let id = sqlx::query_scalar::<_, ProductId>(
            "INSERT INTO shop.product \
                (name, description, price, stock, images, category_id, color, sizes, active) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id",
        )
        .bind(new.name.trim())
        .bind(&new.description)
        .bind(new.price)
        .bind(new.stock)
        .bind(&new.images)
        .bind(new.category_id)
        .bind(new.color.as_deref())
        .bind(&new.sizes)
        .bind(new.active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "category does not exist"))?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Apply a partial update. Absent fields are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new category does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("UPDATE shop.product SET updated_at = NOW()");

        if let Some(name) = &update.name {
            qb.push(", name = ").push_bind(name.trim().to_string());
        }
        if let Some(description) = &update.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(price) = update.price {
            qb.push(", price = ").push_bind(price);
        }
        if let Some(stock) = update.stock {
            qb.push(", stock = ").push_bind(stock);
        }
        if let Some(images) = &update.images {
            qb.push(", images = ").push_bind(images.clone());
        }
        if let Some(category_id) = update.category_id {
            qb.push(", category_id = ").push_bind(category_id);
        }
        if let Some(color) = &update.color {
            qb.push(", color = ").push_bind(color.clone());
        }
        if let Some(sizes) = &update.sizes {
            qb.push(", sizes = ").push_bind(sizes.clone());
        }
        if let Some(active) = update.active {
            qb.push(", active = ").push_bind(active);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING id");

        let updated = qb
            .build_query_scalar::<ProductId>()
            .fetch_optional(self.pool)
            .await
            .map_err(|e| conflict_or_database(e, "category does not exist"))?
            .ok_or(RepositoryError::NotFound)?;

        self.get_by_id(updated).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product (it also leaves every cart).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if orders reference it.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| conflict_or_database(e, "product is referenced by orders"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100% cotton"), "100\\% cotton");
        assert_eq!(escape_like("slim_fit"), "slim\\_fit");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("kurta"), "kurta");
    }

    #[test]
    fn test_order_clause() {
        assert!(order_clause(None).contains("p.id ASC"));
        assert!(order_clause(Some(ProductSort::PriceAsc)).contains("p.price ASC"));
        assert!(order_clause(Some(ProductSort::PriceDesc)).contains("p.price DESC"));
        assert_eq!(
            order_clause(Some(ProductSort::Featured)),
            order_clause(Some(ProductSort::Newest))
        );
    }
}
