//! Health checks, fallbacks and the middleware every response passes through.

#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use loomshop_integration_tests::{CLIENT_URL, expect_json, send, test_app, test_config};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_liveness() {
    let app = test_app(test_config());
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let app = test_app(test_config());
    let response = send(&app, get("/health/ready")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = test_app(test_config());
    let json = expect_json(send(&app, get("/api/nope")).await, StatusCode::NOT_FOUND).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Not Found - /api/nope");
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = test_app(test_config());
    let response = send(&app, get("/health")).await;
    let headers = response.headers();

    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_upstream_request_id_is_echoed() {
    let app = test_app(test_config());
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "edge-1234")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.headers()["x-request-id"], "edge-1234");
}

#[tokio::test]
async fn test_cors_preflight_allows_client_origin() {
    let app = test_app(test_config());
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/products")
        .header(header::ORIGIN, CLIENT_URL)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        CLIENT_URL
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}

#[tokio::test]
async fn test_malformed_price_filter_is_rejected() {
    let app = test_app(test_config());
    let json = expect_json(
        send(&app, get("/api/products?minPrice=cheap")).await,
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(json["message"], "minPrice must be a number");
}
