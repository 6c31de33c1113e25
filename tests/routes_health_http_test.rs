// ABOUTME: HTTP tests for health and readiness endpoints and response-wide middleware
// ABOUTME: Checks liveness, readiness checks, security headers and request IDs
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use axum::http::StatusCode;
use common::TestApp;
use helpers::axum_test::AxumTestRequest;
use serde_json::Value;

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;
    let response = AxumTestRequest::get("/health")
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_reports_backends() {
    let app = TestApp::new().await;
    let response = AxumTestRequest::get("/ready")
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["database"]["healthy"], true);
    assert_eq!(body["checks"]["rateLimit"]["healthy"], true);
    assert_eq!(body["checks"]["rateLimit"]["backend"], "memory");
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = TestApp::new().await;
    let response = AxumTestRequest::get("/health").send(app.router()).await;

    assert_eq!(
        response.header("x-content-type-options").as_deref(),
        Some("nosniff")
    );
    assert_eq!(response.header("x-frame-options").as_deref(), Some("DENY"));
    assert_eq!(
        response.header("cache-control").as_deref(),
        Some("no-store")
    );
    // HSTS is only sent in production
    assert!(response.header("strict-transport-security").is_none());
    assert!(response.header("x-request-id").is_some());
}

#[tokio::test]
async fn test_incoming_request_id_is_propagated() {
    let app = TestApp::new().await;
    let response = AxumTestRequest::get("/health")
        .header("x-request-id", "req-from-proxy")
        .send(app.router())
        .await;
    assert_eq!(
        response.header("x-request-id").as_deref(),
        Some("req-from-proxy")
    );
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new().await;
    AxumTestRequest::get("/api/does-not-exist")
        .send(app.router())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
