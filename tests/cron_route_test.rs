// ABOUTME: Integration tests for the scheduled cleanup endpoint
// ABOUTME: Covers bearer secret checks, the summary body and a missing secret
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use account_core::constants::routes::CRON_CLEANUP_DELETED_ACCOUNTS;
use account_server::database_plugins::DatabaseProvider;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{test_config, unique_email, TestApp, TEST_CRON_SECRET};
use helpers::axum_test::AxumTestRequest;
use serde_json::Value;

#[tokio::test]
async fn test_cleanup_requires_the_cron_secret() {
    let app = TestApp::new().await;

    let response = AxumTestRequest::get(CRON_CLEANUP_DELETED_ACCOUNTS)
        .send(app.router())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["success"], false);

    AxumTestRequest::get(CRON_CLEANUP_DELETED_ACCOUNTS)
        .bearer("not-the-secret")
        .send(app.router())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cleanup_returns_summary() {
    let app = TestApp::new().await;
    let user = app.register(&unique_email("cron")).await;
    app.resources
        .database
        .soft_delete_user(user.id, Utc::now() - Duration::days(31))
        .await
        .expect("backdated delete");

    let response = AxumTestRequest::get(CRON_CLEANUP_DELETED_ACCOUNTS)
        .bearer(TEST_CRON_SECRET)
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["deletedCount"], 1);
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(0));
    assert!(body["message"].is_string());
    assert!(app.user(user.id).await.anonymized_at.is_some());
}

#[tokio::test]
async fn test_cleanup_without_configured_secret_is_a_server_error() {
    let mut config = test_config();
    config.lifecycle.cron_secret = None;
    let app = TestApp::with_config(config).await;

    let response = AxumTestRequest::get(CRON_CLEANUP_DELETED_ACCOUNTS)
        .bearer(TEST_CRON_SECRET)
        .send(app.router())
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "CONFIG_ERROR");
}
