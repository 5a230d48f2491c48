//! Product catalog route handlers.
//!
//! Listings are served from the in-process cache when possible; every write
//! clears it.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use loomshop_core::{CategoryId, ProductId};

use super::not_found_as;
use crate::db::{CategoryRepository, ProductRepository};
use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Product, ProductFilter, ProductQuery, ProductUpdate};
use crate::state::AppState;

/// List products matching the query filters.
///
/// GET /api/products
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<ApiResponse<Arc<Vec<Product>>>> {
    let filter = ProductFilter::try_from(query).map_err(AppError::BadRequest)?;

    let generation = state.products().generation();
    if let Some(products) = state.products().get(&filter).await {
        tracing::debug!(count = products.len(), "Product listing cache hit");
        return Ok(ApiResponse::ok(products));
    }

    let products = Arc::new(ProductRepository::new(state.pool()).list(&filter).await?);
    state
        .products()
        .insert(generation, filter, Arc::clone(&products))
        .await;

    Ok(ApiResponse::ok(products))
}

/// Show one product.
///
/// GET /api/products/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse<Product>> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(ApiResponse::ok(product))
}

/// Create a product.
///
/// POST /api/products
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, name = %body.name))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewProduct>,
) -> Result<ApiResponse<Product>> {
    body.validate().map_err(AppError::BadRequest)?;
    ensure_category(&state, body.category_id).await?;

    let product = ProductRepository::new(state.pool()).create(&body).await?;
    state.products().invalidate_all();

    tracing::info!(product_id = %product.id, "Product created");
    Ok(ApiResponse::created(product, "Product created"))
}

/// Update a product. Absent fields are left unchanged.
///
/// PUT /api/products/{id}
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductUpdate>,
) -> Result<ApiResponse<Product>> {
    body.validate().map_err(AppError::BadRequest)?;
    if let Some(category_id) = body.category_id {
        ensure_category(&state, category_id).await?;
    }

    let product = ProductRepository::new(state.pool())
        .update(id, &body)
        .await
        .map_err(|e| not_found_as(e, "Product not found"))?;
    state.products().invalidate_all();

    Ok(ApiResponse::ok(product).message("Product updated"))
}

/// Delete a product.
///
/// DELETE /api/products/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<ApiResponse<()>> {
    ProductRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(|e| not_found_as(e, "Product not found"))?;
    state.products().invalidate_all();

    tracing::info!(product_id = %id, "Product deleted");
    Ok(ApiResponse::done("Product removed"))
}

async fn ensure_category(state: &AppState, id: CategoryId) -> Result<()> {
    if CategoryRepository::new(state.pool()).exists(id).await? {
        Ok(())
    } else {
        Err(AppError::BadRequest("Category not found".to_string()))
    }
}
