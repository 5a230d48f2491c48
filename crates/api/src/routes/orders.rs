//! Order route handlers.
//!
//! Checkout turns the caller's cart into an order. Cash-on-delivery orders
//! are final at once; online orders stay `PENDING` until the gateway webhook
//! reports the payment (see [`super::payment`]).

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use loomshop_core::{CURRENCY, OrderId, OrderStatus, PaymentMethod, to_minor_units};

use super::not_found_as;
use crate::db::{CartRepository, CheckoutError, NewOrder, OrderRepository};
use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{GatewayCheckout, Order, ShippingDetails, max_order_total};
use crate::services::PaymentError;
use crate::services::payment::receipt_for;
use crate::state::AppState;

/// Checkout body: shipping details plus the payment method.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(flatten)]
    pub shipping: ShippingDetails,
    pub payment_method: PaymentMethod,
}

/// Admin status change body.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

/// Place an order from the caller's cart.
///
/// POST /api/orders
///
/// For online payment the gateway order is created before anything is
/// written, so a gateway failure leaves no local order behind. The cart is
/// re-read under lock when the order is written; if it no longer matches the
/// quoted total the checkout is refused and the unpaid gateway order lapses.
#[instrument(
    skip(state, user, body),
    fields(user_id = %user.id, payment_method = ?body.payment_method)
)]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CreateOrderRequest>,
) -> Result<Response> {
    body.shipping
        .validate()
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    let cart = CartRepository::new(state.pool()).get_or_create(user.id).await?;
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".to_string()));
    }
    let total_amount = cart.total();
    if total_amount > max_order_total() {
        return Err(AppError::BadRequest("Order total is too large".to_string()));
    }

    let gateway_order = if body.payment_method.is_online() {
        let razorpay = state.razorpay().ok_or_else(|| {
            AppError::BadRequest("Online payment is not available".to_string())
        })?;
        let amount = to_minor_units(total_amount).map_err(PaymentError::from)?;
        let receipt = receipt_for(user.id, Utc::now().timestamp_millis());
        Some(razorpay.create_order(amount, CURRENCY, &receipt).await?)
    } else {
        None
    };

    let order = OrderRepository::new(state.pool())
        .create(&NewOrder {
            user_id: user.id,
            cart_id: cart.id,
            total_amount,
            payment_method: body.payment_method,
            razorpay_order_id: gateway_order.as_ref().map(|g| g.id.as_str()),
            shipping: &body.shipping,
        })
        .await
        .map_err(checkout_error)?;

    tracing::info!(order_id = %order.id, total = %order.total_amount, "Order placed");

    match (gateway_order, state.razorpay()) {
        (Some(gateway_order), Some(razorpay)) => Ok(ApiResponse::created(
            GatewayCheckout {
                order_id: order.id,
                razorpay_order_id: gateway_order.id,
                amount: order.total_amount,
                currency: CURRENCY,
                key_id: razorpay.key_id().to_string(),
            },
            "Razorpay order created",
        )
        .into_response()),
        _ => {
            state.notifier().order_placed(
                user.email.as_str(),
                &user.name,
                order.id,
                order.total_amount,
            );
            Ok(ApiResponse::created(order, "Order placed successfully").into_response())
        }
    }
}

/// The caller's orders, newest first.
///
/// GET /api/orders/myorders
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn mine(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(ApiResponse::ok(orders))
}

/// Every order with its customer, newest first.
///
/// GET /api/orders
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<ApiResponse<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool()).list_all().await?;
    Ok(ApiResponse::ok(orders))
}

/// Move an order along its lifecycle.
///
/// PUT /api/orders/{id}
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, status = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<ApiResponse<Order>> {
    let next = parse_status(&body.status)?;

    let order = OrderRepository::new(state.pool())
        .update_status(id, next)
        .await
        .map_err(|e| not_found_as(e, "Order not found"))?;

    tracing::info!(order_id = %order.id, status = %order.status, "Order status updated");
    Ok(ApiResponse::ok(order).message("Order status updated"))
}

fn checkout_error(err: CheckoutError) -> AppError {
    match err {
        CheckoutError::EmptyCart => AppError::BadRequest("Cart is empty".to_string()),
        CheckoutError::CartChanged { quoted, current } => {
            tracing::info!(%quoted, %current, "Cart changed during checkout");
            AppError::Conflict("Your cart changed during checkout, please try again".to_string())
        }
        CheckoutError::Repository(e) => e.into(),
    }
}

/// Status names are matched case-insensitively.
fn parse_status(value: &str) -> Result<OrderStatus> {
    value
        .trim()
        .parse::<OrderStatus>()
        .map_err(|_| AppError::BadRequest(format!("Invalid order status: {value}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_body_flattens_shipping() {
        let body: CreateOrderRequest = serde_json::from_str(
            r#"{
                "fullName": "Meera Iyer",
                "phone": "9000000001",
                "addressLine1": "12 MG Road",
                "city": "Bengaluru",
                "state": "Karnataka",
                "postalCode": "560001",
                "country": "India",
                "paymentMethod": "RAZORPAY"
            }"#,
        )
        .unwrap();
        assert_eq!(body.payment_method, PaymentMethod::Razorpay);
        assert_eq!(body.shipping.city, "Bengaluru");
        assert!(body.shipping.validate().is_ok());
    }

    #[test]
    fn test_unknown_payment_method_is_rejected() {
        let body = serde_json::from_str::<CreateOrderRequest>(r#"{"paymentMethod":"UPI"}"#);
        assert!(body.is_err());
    }

    #[test]
    fn test_checkout_errors() {
        use axum::http::StatusCode;

        let status = |err| checkout_error(err).into_response().status();
        assert_eq!(status(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(CheckoutError::CartChanged {
                quoted: rust_decimal::Decimal::new(1000, 2),
                current: rust_decimal::Decimal::new(2000, 2),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(CheckoutError::Repository(crate::db::RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("SHIPPED").unwrap(), OrderStatus::Shipped);
        assert_eq!(parse_status(" delivered ").unwrap(), OrderStatus::Delivered);
        assert!(parse_status("LOST").is_err());
        assert!(parse_status("").is_err());
    }
}
