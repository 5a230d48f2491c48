//! Webhook signature handling.
//!
//! Signatures below are HMAC-SHA256 of the exact body bytes under
//! `whsec_test`.

#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use loomshop_integration_tests::{expect_json, send, test_app, test_config};

const CAPTURED_WITHOUT_PAYMENT: &str = r#"{"event":"payment.captured"}"#;
const CAPTURED_WITHOUT_PAYMENT_SIG: &str =
    "4f463a57dd128675850163391f0311888616d57bccca75c774c9cdb28134f851";

const REFUND_EVENT: &str = r#"{"event":"refund.created","payload":{}}"#;
const REFUND_EVENT_SIG: &str = "f79493185315fd266e92730fb847417b13e3b7e9be3eb57e66b02d60cabe38c3";

const NOT_JSON: &str = "not json";
const NOT_JSON_SIG: &str = "1e0ac5fc5323736ef15042f0a81247010d14b4662d47e5b1fb78f3f50eb44ea5";

fn webhook(body: &'static str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/payment/webhook")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-razorpay-signature", signature);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let app = test_app(test_config());
    let json = expect_json(
        send(&app, webhook(REFUND_EVENT, None)).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let app = test_app(test_config());
    let response = send(
        &app,
        webhook(r#"{"event":"refund.created","payload":{ }}"#, Some(REFUND_EVENT_SIG)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unconfigured_secret_rejects_everything() {
    let mut config = test_config();
    config.razorpay_webhook_secret = None;
    let app = test_app(config);

    let response = send(&app, webhook(REFUND_EVENT, Some(REFUND_EVENT_SIG))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unhandled_event_is_acknowledged() {
    let app = test_app(test_config());
    let json = expect_json(
        send(&app, webhook(REFUND_EVENT, Some(REFUND_EVENT_SIG))).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn test_upper_case_signature_is_accepted() {
    let app = test_app(test_config());
    let signature = REFUND_EVENT_SIG.to_ascii_uppercase();
    let response = send(&app, webhook(REFUND_EVENT, Some(&signature))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_capture_without_order_reference_is_acknowledged() {
    let app = test_app(test_config());
    let response = send(
        &app,
        webhook(CAPTURED_WITHOUT_PAYMENT, Some(CAPTURED_WITHOUT_PAYMENT_SIG)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signed_garbage_is_rejected_after_verification() {
    let app = test_app(test_config());
    let json = expect_json(
        send(&app, webhook(NOT_JSON, Some(NOT_JSON_SIG))).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(json["message"], "Malformed webhook payload");
}
