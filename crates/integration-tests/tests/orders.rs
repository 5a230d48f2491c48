//! Checkout and payment reconciliation against a real database.
//!
//! Each test gets a fresh database with the API migrations applied.
//!
//! Run with: `DATABASE_URL=postgres://... cargo test -p loomshop-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use loomshop_api::db::{
    CartRepository, CheckoutError, NewOrder, OrderRepository, RepositoryError, UserRepository,
};
use loomshop_api::models::{Cart, MAX_LINE_QUANTITY, Order, ShippingDetails};
use loomshop_api::services::auth::hash_otp;
use loomshop_core::{OrderStatus, PaymentMethod, ProductId, UserId};

async fn seed_user(pool: &PgPool, email: &str) -> UserId {
    let id: i32 = sqlx::query_scalar(
        "INSERT INTO shop.user (name, email, password_hash) VALUES ('Meera Iyer', $1, 'x') \
         RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap();
    UserId::new(id)
}

async fn seed_product(pool: &PgPool, name: &str, price: Decimal) -> ProductId {
    let id: i32 = sqlx::query_scalar(
        "WITH cat AS ( \
             INSERT INTO shop.category (name) VALUES ('Kurtas') \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name \
             RETURNING id \
         ) \
         INSERT INTO shop.product (name, price, stock, category_id, sizes) \
         SELECT $1, $2, 10, id, ARRAY['M'] FROM cat \
         RETURNING id",
    )
    .bind(name)
    .bind(price)
    .fetch_one(pool)
    .await
    .unwrap();
    ProductId::new(id)
}

fn shipping() -> ShippingDetails {
    ShippingDetails {
        full_name: "Meera Iyer".to_string(),
        phone: "9000000001".to_string(),
        address_line1: "12 MG Road".to_string(),
        address_line2: None,
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        postal_code: "560001".to_string(),
        country: "India".to_string(),
    }
}

fn new_order<'a>(
    cart: &Cart,
    method: PaymentMethod,
    gateway_id: Option<&'a str>,
    shipping: &'a ShippingDetails,
) -> NewOrder<'a> {
    NewOrder {
        user_id: cart.user_id,
        cart_id: cart.id,
        total_amount: cart.total(),
        payment_method: method,
        razorpay_order_id: gateway_id,
        shipping,
    }
}

/// A user with one kurta (size M, ₹499.00 x 2) in their cart.
async fn filled_cart(pool: &PgPool) -> Cart {
    let user = seed_user(pool, "meera@example.com").await;
    let product = seed_product(pool, "Cotton kurta", Decimal::new(49_900, 2)).await;
    CartRepository::new(pool)
        .add_item(user, product, 2, Some("M"))
        .await
        .unwrap()
}

async fn place_online_order(pool: &PgPool, gateway_id: &str) -> (Cart, Order) {
    let cart = filled_cart(pool).await;
    let details = shipping();
    let order = OrderRepository::new(pool)
        .create(&new_order(&cart, PaymentMethod::Razorpay, Some(gateway_id), &details))
        .await
        .unwrap();
    (cart, order)
}

async fn status_of(pool: &PgPool, order: &Order) -> Order {
    OrderRepository::new(pool)
        .get_by_id(order.id)
        .await
        .unwrap()
        .unwrap()
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_cod_checkout_clears_ordered_lines(pool: PgPool) {
    let cart = filled_cart(&pool).await;
    let details = shipping();

    let order = OrderRepository::new(&pool)
        .create(&new_order(&cart, PaymentMethod::Cod, None, &details))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, Decimal::new(99_800, 2));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[0].price, Decimal::new(49_900, 2));

    let after = CartRepository::new(&pool).get_or_create(cart.user_id).await.unwrap();
    assert!(after.is_empty());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_online_checkout_keeps_cart_until_captured(pool: PgPool) {
    let (cart, order) = place_online_order(&pool, "order_rzp_1").await;
    let carts = CartRepository::new(&pool);

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(carts.get_or_create(cart.user_id).await.unwrap().items.len(), 1);

    let capture = OrderRepository::new(&pool)
        .mark_paid("order_rzp_1", "pay_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(capture.order_id, order.id);
    assert_eq!(capture.total_amount, Decimal::new(99_800, 2));
    assert_eq!(capture.customer_email, "meera@example.com");

    let paid = status_of(&pool, &order).await;
    assert_eq!(paid.status, OrderStatus::Paid);
    assert_eq!(paid.razorpay_payment_id.as_deref(), Some("pay_1"));
    assert!(carts.get_or_create(cart.user_id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_repeated_capture_changes_nothing(pool: PgPool) {
    let (cart, order) = place_online_order(&pool, "order_rzp_2").await;
    let orders = OrderRepository::new(&pool);
    let carts = CartRepository::new(&pool);

    assert!(orders.mark_paid("order_rzp_2", "pay_2").await.unwrap().is_some());
    let first = status_of(&pool, &order).await;

    // The customer starts a new cart before the gateway redelivers.
    let product = seed_product(&pool, "Linen shirt", Decimal::new(129_900, 2)).await;
    carts.add_item(cart.user_id, product, 1, None).await.unwrap();

    assert!(orders.mark_paid("order_rzp_2", "pay_2").await.unwrap().is_none());
    assert!(orders.mark_paid("order_rzp_2", "pay_other").await.unwrap().is_none());

    let second = status_of(&pool, &order).await;
    assert_eq!(second.status, OrderStatus::Paid);
    assert_eq!(second.razorpay_payment_id.as_deref(), Some("pay_2"));
    assert_eq!(second.updated_at, first.updated_at);
    assert_eq!(carts.get_or_create(cart.user_id).await.unwrap().items.len(), 1);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_failure_only_moves_pending_orders(pool: PgPool) {
    let (cart, order) = place_online_order(&pool, "order_rzp_3").await;
    let orders = OrderRepository::new(&pool);

    assert!(orders.mark_failed("order_rzp_3").await.unwrap());
    assert!(!orders.mark_failed("order_rzp_3").await.unwrap());
    assert!(orders.mark_paid("order_rzp_3", "pay_late").await.unwrap().is_none());
    assert_eq!(status_of(&pool, &order).await.status, OrderStatus::Failed);

    // A failed payment leaves the cart for another attempt.
    let carts = CartRepository::new(&pool);
    assert_eq!(carts.get_or_create(cart.user_id).await.unwrap().items.len(), 1);

    assert!(!orders.mark_failed("order_unknown").await.unwrap());
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_late_failure_does_not_undo_capture(pool: PgPool) {
    let (_, order) = place_online_order(&pool, "order_rzp_4").await;
    let orders = OrderRepository::new(&pool);

    assert!(orders.mark_paid("order_rzp_4", "pay_4").await.unwrap().is_some());
    assert!(!orders.mark_failed("order_rzp_4").await.unwrap());
    assert_eq!(status_of(&pool, &order).await.status, OrderStatus::Paid);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_checkout_refuses_cart_changed_after_quote(pool: PgPool) {
    let cart = filled_cart(&pool).await;
    let details = shipping();
    let quote = new_order(&cart, PaymentMethod::Cod, None, &details);

    let product = seed_product(&pool, "Linen shirt", Decimal::new(129_900, 2)).await;
    let carts = CartRepository::new(&pool);
    carts.add_item(cart.user_id, product, 1, None).await.unwrap();

    let err = OrderRepository::new(&pool).create(&quote).await.unwrap_err();
    assert!(matches!(err, CheckoutError::CartChanged { .. }));

    assert!(OrderRepository::new(&pool)
        .list_for_user(cart.user_id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(carts.get_or_create(cart.user_id).await.unwrap().items.len(), 2);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_concurrent_cod_checkouts_place_one_order(pool: PgPool) {
    let cart = filled_cart(&pool).await;
    let details = shipping();
    let request = new_order(&cart, PaymentMethod::Cod, None, &details);
    let orders = OrderRepository::new(&pool);

    let (first, second) = tokio::join!(orders.create(&request), orders.create(&request));

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(CheckoutError::EmptyCart)))
    );
    assert_eq!(orders.list_for_user(cart.user_id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_unpaid_online_order_cannot_ship(pool: PgPool) {
    let (_, order) = place_online_order(&pool, "order_rzp_5").await;
    let orders = OrderRepository::new(&pool);

    let err = orders
        .update_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));

    // The webhook can still record the payment, after which shipping is allowed.
    assert!(orders.mark_paid("order_rzp_5", "pay_5").await.unwrap().is_some());
    let shipped = orders
        .update_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_cod_order_lifecycle(pool: PgPool) {
    let cart = filled_cart(&pool).await;
    let details = shipping();
    let orders = OrderRepository::new(&pool);
    let order = orders
        .create(&new_order(&cart, PaymentMethod::Cod, None, &details))
        .await
        .unwrap();

    assert!(matches!(
        orders.update_status(order.id, OrderStatus::Paid).await,
        Err(RepositoryError::Conflict(_))
    ));

    orders.update_status(order.id, OrderStatus::Shipped).await.unwrap();
    let delivered = orders
        .update_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    assert!(matches!(
        orders.update_status(order.id, OrderStatus::Cancelled).await,
        Err(RepositoryError::Conflict(_))
    ));
    assert!(matches!(
        orders
            .update_status(loomshop_core::OrderId::new(i32::MAX), OrderStatus::Shipped)
            .await,
        Err(RepositoryError::NotFound)
    ));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_merged_cart_quantity_is_capped(pool: PgPool) {
    let user = seed_user(&pool, "bulk@example.com").await;
    let product = seed_product(&pool, "Cotton kurta", Decimal::new(49_900, 2)).await;
    let carts = CartRepository::new(&pool);

    carts.add_item(user, product, MAX_LINE_QUANTITY, None).await.unwrap();
    let cart = carts.add_item(user, product, MAX_LINE_QUANTITY, None).await.unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
async fn test_otp_is_consumed_once(pool: PgPool) {
    let user = seed_user(&pool, "otp@example.com").await;
    let users = UserRepository::new(&pool);
    let code = hash_otp("482913");

    users
        .set_otp(user, &code, Utc::now() + Duration::minutes(10))
        .await
        .unwrap();
    assert!(!users.consume_otp(user, &hash_otp("000000")).await.unwrap());

    let (first, second) = tokio::join!(users.consume_otp(user, &code), users.consume_otp(user, &code));
    assert!(first.unwrap() ^ second.unwrap());

    users
        .set_otp(user, &code, Utc::now() - Duration::minutes(1))
        .await
        .unwrap();
    assert!(!users.consume_otp(user, &code).await.unwrap());
    assert!(!users.reset_password(user, &code, "new-hash").await.unwrap());
}
