//! Catalog domain types: categories, products and listing filters.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use loomshop_core::{CategoryId, ProductId, ProductSort};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A product with its category.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub images: Vec<String>,
    pub category_id: CategoryId,
    pub category: Category,
    pub color: Option<String>,
    pub sizes: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stock availability filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Availability {
    InStock,
    OutOfStock,
}

impl FromStr for Availability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_stock" => Ok(Self::InStock),
            "out_of_stock" => Ok(Self::OutOfStock),
            _ => Err(format!("invalid availability: {s}")),
        }
    }
}

/// Raw product listing query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub active: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub sizes: Option<String>,
    pub availability: Option<String>,
}

/// Normalised product listing filter.
///
/// Two queries that select the same products compare equal, so the filter
/// doubles as the listing cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub active: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Lower-cased; matched case-insensitively.
    pub color: Option<String>,
    /// Sorted and de-duplicated; a product matches when it has any of them.
    pub sizes: Vec<String>,
    pub availability: Option<Availability>,
    pub sort: Option<ProductSort>,
}

impl TryFrom<ProductQuery> for ProductFilter {
    type Error = String;

    /// Unknown `sort` and `availability` values are ignored; malformed prices
    /// are rejected.
    fn try_from(query: ProductQuery) -> Result<Self, Self::Error> {
        let sizes_source = non_blank(query.sizes).or_else(|| non_blank(query.size));
        let mut sizes: Vec<String> = sizes_source
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        sizes.sort();
        sizes.dedup();

        Ok(Self {
            category: non_blank(query.category),
            search: non_blank(query.search),
            active: non_blank(query.active).map(|v| v == "true"),
            min_price: parse_price(query.min_price, "minPrice")?,
            max_price: parse_price(query.max_price, "maxPrice")?,
            color: non_blank(query.color).map(|c| c.to_lowercase()),
            sizes,
            availability: non_blank(query.availability).and_then(|a| a.parse().ok()),
            sort: non_blank(query.sort).and_then(|s| s.parse().ok()),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_price(value: Option<String>, field: &str) -> Result<Option<Decimal>, String> {
    non_blank(value)
        .map(|v| Decimal::from_str(&v).map_err(|_| format!("{field} must be a number")))
        .transpose()
}

/// Product creation body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
    pub category_id: CategoryId,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl NewProduct {
    /// # Errors
    ///
    /// Returns a client-facing message for a blank name or negative amounts.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Product name is required".to_string());
        }
        validate_amounts(Some(self.price), Some(self.stock))
    }
}

/// Partial product update body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub images: Option<Vec<String>>,
    pub category_id: Option<CategoryId>,
    pub color: Option<String>,
    pub sizes: Option<Vec<String>>,
    pub active: Option<bool>,
}

impl ProductUpdate {
    /// # Errors
    ///
    /// Returns a client-facing message for a blank name or negative amounts.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("Product name cannot be empty".to_string());
        }
        validate_amounts(self.price, self.stock)
    }
}

fn validate_amounts(price: Option<Decimal>, stock: Option<i32>) -> Result<(), String> {
    if price.is_some_and(|p| p.is_sign_negative() && !p.is_zero()) {
        return Err("Price cannot be negative".to_string());
    }
    if stock.is_some_and(|s| s < 0) {
        return Err("Stock cannot be negative".to_string());
    }
    Ok(())
}
