//! Cart route handlers. Every route acts on the caller's own cart.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tracing::instrument;

use loomshop_core::{CartItemId, ProductId};

use super::not_found_as;
use crate::db::CartRepository;
use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Cart, MAX_LINE_QUANTITY};
use crate::state::AppState;

/// Add-to-cart body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub size: Option<String>,
}

const fn default_quantity() -> i32 {
    1
}

/// Quantity change body.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

fn check_quantity(quantity: i32) -> Result<()> {
    if quantity < 1 {
        return Err(AppError::BadRequest(
            "Quantity must be at least 1".to_string(),
        ));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "Quantity cannot exceed {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// The caller's cart.
///
/// GET /api/cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<Cart>> {
    let cart = CartRepository::new(state.pool()).get_or_create(user.id).await?;
    Ok(ApiResponse::ok(cart))
}

/// Add a product, merging with an existing line of the same size.
///
/// POST /api/cart
#[instrument(skip(state, user, body), fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddItemRequest>,
) -> Result<ApiResponse<Cart>> {
    check_quantity(body.quantity)?;

    let cart = CartRepository::new(state.pool())
        .add_item(user.id, body.product_id, body.quantity, body.size.as_deref())
        .await
        .map_err(|e| not_found_as(e, "Product not found"))?;

    Ok(ApiResponse::ok(cart).message("Item added to cart"))
}

/// Set a line's quantity.
///
/// PUT /api/cart/{item_id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<CartItemId>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<ApiResponse<Cart>> {
    check_quantity(body.quantity)?;

    let cart = CartRepository::new(state.pool())
        .update_item(user.id, item_id, body.quantity)
        .await
        .map_err(|e| not_found_as(e, "Item not found in cart"))?;

    Ok(ApiResponse::ok(cart).message("Cart updated"))
}

/// Remove a line.
///
/// DELETE /api/cart/{item_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<CartItemId>,
) -> Result<ApiResponse<Cart>> {
    let cart = CartRepository::new(state.pool())
        .remove_item(user.id, item_id)
        .await
        .map_err(|e| not_found_as(e, "Item not found in cart"))?;

    Ok(ApiResponse::ok(cart).message("Item removed from cart"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_defaults_to_one() {
        let body: AddItemRequest = serde_json::from_str(r#"{"productId":5}"#).unwrap();
        assert_eq!(body.quantity, 1);
        assert!(body.size.is_none());
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert!(check_quantity(1).is_ok());
        assert!(check_quantity(0).is_err());
        assert!(check_quantity(-3).is_err());
    }

    #[test]
    fn test_quantity_is_capped() {
        assert!(check_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(check_quantity(MAX_LINE_QUANTITY + 1).is_err());
        assert!(check_quantity(i32::MAX).is_err());
    }
}
