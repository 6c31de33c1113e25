// ABOUTME: Integration tests for password reset by email and password change
// ABOUTME: Covers the uniform reset response, token reuse, session revocation and field errors
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use account_core::constants::messages;
use account_core::errors::ErrorCode;
use account_core::models::NotificationKind;
use account_server::database_plugins::DatabaseProvider;
use account_server::services::types::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest,
};
use account_server::services::PasswordService;
use common::{unique_client, unique_email, TestApp, TEST_PASSWORD};

const NEW_PASSWORD: &str = "brand-new-secret-7";

fn passwords(app: &TestApp) -> PasswordService {
    PasswordService::new(app.resources.clone())
}

#[tokio::test]
async fn test_reset_request_response_does_not_reveal_accounts() {
    let app = TestApp::new().await;
    let email = unique_email("known");
    app.register(&email).await;

    let known = passwords(&app)
        .request_reset(ForgotPasswordRequest {
            email: email.clone(),
        })
        .await
        .expect("known address");
    let unknown_email = unique_email("unknown");
    let unknown = passwords(&app)
        .request_reset(ForgotPasswordRequest {
            email: unknown_email.clone(),
        })
        .await
        .expect("unknown address");

    assert_eq!(known.value.message, messages::PASSWORD_RESET_REQUESTED);
    assert_eq!(unknown.value.message, messages::PASSWORD_RESET_REQUESTED);
    assert!(app.outbox.last_to(&email, "password_reset").await.is_some());
    assert!(app
        .outbox
        .last_to(&unknown_email, "password_reset")
        .await
        .is_none());
}

#[tokio::test]
async fn test_reset_password_revokes_sessions_and_spends_token() {
    let app = TestApp::new().await;
    let (caller, token) = app.signed_in("reset").await;
    let email = caller.user.email.clone();

    passwords(&app)
        .request_reset(ForgotPasswordRequest {
            email: email.clone(),
        })
        .await
        .expect("request");
    let reset_token = app.emailed_token(&email, "password_reset").await;

    passwords(&app)
        .reset_password(
            ResetPasswordRequest {
                token: reset_token.clone(),
                password: NEW_PASSWORD.to_owned(),
            },
            &unique_client(),
        )
        .await
        .expect("reset");

    assert!(app.auth().authenticate(&token).await.is_err());
    assert!(app
        .auth()
        .login(
            LoginRequest {
                email: email.clone(),
                password: TEST_PASSWORD.to_owned(),
            },
            &unique_client(),
        )
        .await
        .is_err());
    app.login(&email, NEW_PASSWORD).await;

    let reused = passwords(&app)
        .reset_password(
            ResetPasswordRequest {
                token: reset_token,
                password: "another-secret-9".to_owned(),
            },
            &unique_client(),
        )
        .await
        .expect_err("token already used");
    assert_eq!(reused.code, ErrorCode::TokenInvalid);

    assert!(app
        .outbox
        .last_to(&email, "password_changed")
        .await
        .is_some());
    let notifications = app
        .resources
        .database
        .list_notifications(caller.user.id, false, 10)
        .await
        .expect("notifications");
    assert!(notifications
        .iter()
        .any(|n| n.kind == NotificationKind::PasswordChanged));
}

#[tokio::test]
async fn test_reset_password_validates_before_spending_token() {
    let app = TestApp::new().await;
    let email = unique_email("weakreset");
    app.register(&email).await;
    passwords(&app)
        .request_reset(ForgotPasswordRequest {
            email: email.clone(),
        })
        .await
        .expect("request");
    let reset_token = app.emailed_token(&email, "password_reset").await;

    let weak = passwords(&app)
        .reset_password(
            ResetPasswordRequest {
                token: reset_token.clone(),
                password: "short".to_owned(),
            },
            &unique_client(),
        )
        .await
        .expect_err("weak password");
    assert_eq!(weak.code, ErrorCode::ValidationFailed);

    passwords(&app)
        .reset_password(
            ResetPasswordRequest {
                token: reset_token,
                password: NEW_PASSWORD.to_owned(),
            },
            &unique_client(),
        )
        .await
        .expect("token still usable");
}

#[tokio::test]
async fn test_change_password_checks_current_and_keeps_this_session() {
    let app = TestApp::new().await;
    let (caller, token) = app.signed_in("change").await;
    let other_token = app.login(&caller.user.email, TEST_PASSWORD).await;

    let wrong = passwords(&app)
        .change_password(
            &caller,
            ChangePasswordRequest {
                current_password: "not-my-password-1".to_owned(),
                new_password: NEW_PASSWORD.to_owned(),
            },
        )
        .await
        .expect_err("wrong current password");
    assert_eq!(wrong.code, ErrorCode::ValidationFailed);
    assert!(wrong.field_errors.contains_key("currentPassword"));

    let same = passwords(&app)
        .change_password(
            &caller,
            ChangePasswordRequest {
                current_password: TEST_PASSWORD.to_owned(),
                new_password: TEST_PASSWORD.to_owned(),
            },
        )
        .await
        .expect_err("unchanged password");
    assert!(same.field_errors.contains_key("newPassword"));

    passwords(&app)
        .change_password(
            &caller,
            ChangePasswordRequest {
                current_password: TEST_PASSWORD.to_owned(),
                new_password: NEW_PASSWORD.to_owned(),
            },
        )
        .await
        .expect("change");

    app.auth()
        .authenticate(&token)
        .await
        .expect("current session kept");
    assert!(app.auth().authenticate(&other_token).await.is_err());
    app.login(&caller.user.email, NEW_PASSWORD).await;
}
