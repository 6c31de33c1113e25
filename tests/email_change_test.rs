// ABOUTME: Integration tests for changing the sign-in email address
// ABOUTME: Checks the confirmation link, the notice to the old address and re-authentication
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use account_core::errors::ErrorCode;
use account_server::services::types::{EmailChangeRequest, TokenRequest};
use account_server::services::EmailChangeService;
use axum::http::StatusCode;
use common::{unique_email, TestApp, TEST_PASSWORD};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};

fn email_changes(app: &TestApp) -> EmailChangeService {
    EmailChangeService::new(app.resources.clone())
}

#[tokio::test]
async fn test_email_change_confirms_new_address_and_notifies_old() {
    let app = TestApp::new().await;
    let (caller, _) = app.signed_in("before").await;
    let old_email = caller.user.email.clone();
    let new_email = unique_email("after");

    email_changes(&app)
        .request_change(
            &caller,
            EmailChangeRequest {
                new_email: new_email.to_uppercase(),
                password: Some(TEST_PASSWORD.to_owned()),
            },
        )
        .await
        .expect("request");

    assert!(app
        .outbox
        .last_to(&old_email, "email_change_notice")
        .await
        .is_some());
    let token = app.emailed_token(&new_email, "email_change_confirm").await;

    // Nothing changes until the link is followed
    assert_eq!(app.user(caller.user.id).await.email, old_email);

    let updated = email_changes(&app)
        .confirm_change(TokenRequest { token })
        .await
        .expect("confirm");
    assert_eq!(updated.email, new_email);
    assert!(updated.email_verified);

    app.login(&new_email, TEST_PASSWORD).await;
}

#[tokio::test]
async fn test_email_change_rejects_taken_address() {
    let app = TestApp::new().await;
    let (caller, _) = app.signed_in("owner").await;
    let taken = unique_email("taken");
    app.register(&taken).await;

    let error = email_changes(&app)
        .request_change(
            &caller,
            EmailChangeRequest {
                new_email: taken,
                password: Some(TEST_PASSWORD.to_owned()),
            },
        )
        .await
        .expect_err("taken");
    assert_eq!(error.code, ErrorCode::ValidationFailed);
    assert!(error.field_errors.contains_key("newEmail"));
}

#[tokio::test]
async fn test_email_change_requires_current_password() {
    let app = TestApp::new().await;
    let (caller, _) = app.signed_in("guarded").await;

    let error = email_changes(&app)
        .request_change(
            &caller,
            EmailChangeRequest {
                new_email: unique_email("elsewhere"),
                password: Some("wrong-password-1".to_owned()),
            },
        )
        .await
        .expect_err("wrong password");
    assert!(error.field_errors.contains_key("password"));
}

#[tokio::test]
async fn test_email_change_confirm_loses_race_for_address() {
    let app = TestApp::new().await;
    let (caller, _) = app.signed_in("racer").await;
    let wanted = unique_email("wanted");

    email_changes(&app)
        .request_change(
            &caller,
            EmailChangeRequest {
                new_email: wanted.clone(),
                password: Some(TEST_PASSWORD.to_owned()),
            },
        )
        .await
        .expect("request");
    let token = app.emailed_token(&wanted, "email_change_confirm").await;

    // Someone registers the address before the link is followed
    app.register(&wanted).await;

    let error = email_changes(&app)
        .confirm_change(TokenRequest { token })
        .await
        .expect_err("address taken");
    assert_eq!(error.code, ErrorCode::ResourceAlreadyExists);
}

#[tokio::test]
async fn test_email_change_routes() {
    let app = TestApp::new().await;
    let (_, token) = app.signed_in("http").await;
    let new_email = unique_email("http-new");

    let response = AxumTestRequest::post("/api/account/email")
        .bearer(&token)
        .json(&json!({ "newEmail": new_email, "password": TEST_PASSWORD }))
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    assert!(response.header("x-ratelimit-limit").is_some());

    let confirm = app.emailed_token(&new_email, "email_change_confirm").await;
    let response = AxumTestRequest::post("/api/account/email/confirm")
        .json(&json!({ "token": confirm }))
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"]["email"], new_email);

    AxumTestRequest::post("/api/account/email")
        .json(&json!({ "newEmail": unique_email("anon"), "password": TEST_PASSWORD }))
        .send(app.router())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
