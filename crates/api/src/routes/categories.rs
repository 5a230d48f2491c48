//! Category route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use loomshop_core::CategoryId;

use super::not_found_as;
use crate::db::CategoryRepository;
use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::Category;
use crate::state::AppState;

/// Category creation body.
#[derive(Debug, Deserialize)]
pub struct NewCategory {
    #[serde(default)]
    pub name: String,
}

/// List all categories.
///
/// GET /api/categories
#[instrument(skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(ApiResponse::ok(categories))
}

/// Create a category.
///
/// POST /api/categories
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<NewCategory>,
) -> Result<ApiResponse<Category>> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Category name is required".to_string()));
    }

    let category = CategoryRepository::new(state.pool()).create(name).await?;
    state.products().invalidate_all();

    Ok(ApiResponse::created(category, "Category created"))
}

/// Delete a category that no product uses.
///
/// DELETE /api/categories/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<ApiResponse<()>> {
    CategoryRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(|e| not_found_as(e, "Category not found"))?;
    state.products().invalidate_all();

    Ok(ApiResponse::done("Category removed"))
}
