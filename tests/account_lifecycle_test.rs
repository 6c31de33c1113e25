// ABOUTME: Integration tests for soft delete, restore, anonymization and account settings
// ABOUTME: Covers the grace period, session management and unlinking sign-in methods
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use account_core::constants::lifecycle::ANONYMIZED_EMAIL_DOMAIN;
use account_core::errors::ErrorCode;
use account_core::models::{LinkedAccount, Session, User};
use account_server::database_plugins::DatabaseProvider;
use account_server::services::types::{
    DeleteAccountRequest, LoginRequest, RestoreAccountRequest, UpdateProfileRequest,
};
use account_server::services::{AccountService, AuthenticatedUser, CleanupService};
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{unique_client, unique_email, TestApp, TEST_PASSWORD};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use tempfile::TempDir;

fn accounts(app: &TestApp) -> AccountService {
    AccountService::new(app.resources.clone())
}

fn delete_request() -> DeleteAccountRequest {
    DeleteAccountRequest {
        password: Some(TEST_PASSWORD.to_owned()),
        confirmation: "DELETE".to_owned(),
    }
}

// ============================================================================
// Soft delete and restore
// ============================================================================

#[tokio::test]
async fn test_delete_requires_typed_confirmation() {
    let app = TestApp::new().await;
    let (caller, _) = app.signed_in("confirm").await;

    let error = accounts(&app)
        .delete_account(
            &caller,
            DeleteAccountRequest {
                password: Some(TEST_PASSWORD.to_owned()),
                confirmation: "delete".to_owned(),
            },
        )
        .await
        .expect_err("confirmation must match exactly");
    assert_eq!(error.code, ErrorCode::ValidationFailed);
    assert!(error.field_errors.contains_key("confirmation"));
    assert!(!app.user(caller.user.id).await.is_deleted);
}

#[tokio::test]
async fn test_delete_then_login_reports_restore_deadline_and_restore_works() {
    let app = TestApp::new().await;
    let (caller, token) = app.signed_in("lifecycle").await;
    let email = caller.user.email.clone();

    let scheduled = accounts(&app)
        .delete_account(&caller, delete_request())
        .await
        .expect("delete");
    let deadline = scheduled.value.restore_deadline;
    assert!(deadline > Utc::now() + Duration::days(29));

    assert!(app.auth().authenticate(&token).await.is_err());
    let stored = app.user(caller.user.id).await;
    assert!(stored.is_deleted);
    assert!(stored.deleted_at.is_some());

    let error = app
        .auth()
        .login(
            LoginRequest {
                email: email.clone(),
                password: TEST_PASSWORD.to_owned(),
            },
            &unique_client(),
        )
        .await
        .expect_err("deleted account cannot sign in");
    assert_eq!(error.code, ErrorCode::AccountDeleted);
    let details = error.details.expect("restore deadline details");
    assert!(details["restoreDeadline"].is_string());

    let restored = accounts(&app)
        .restore_account(
            RestoreAccountRequest {
                email: email.clone(),
                password: TEST_PASSWORD.to_owned(),
            },
            &unique_client(),
        )
        .await
        .expect("restore");
    assert!(!restored.value.user.is_deleted);

    app.login(&email, TEST_PASSWORD).await;
}

#[tokio::test]
async fn test_restore_rejects_wrong_password_and_active_accounts() {
    let app = TestApp::new().await;
    let (caller, _) = app.signed_in("restore").await;
    let email = caller.user.email.clone();

    let active = accounts(&app)
        .restore_account(
            RestoreAccountRequest {
                email: email.clone(),
                password: TEST_PASSWORD.to_owned(),
            },
            &unique_client(),
        )
        .await
        .expect_err("not deleted");
    assert_eq!(active.code, ErrorCode::InvalidInput);

    accounts(&app)
        .delete_account(&caller, delete_request())
        .await
        .expect("delete");
    let wrong = accounts(&app)
        .restore_account(
            RestoreAccountRequest {
                email,
                password: "wrong-password-1".to_owned(),
            },
            &unique_client(),
        )
        .await
        .expect_err("wrong password");
    assert_eq!(wrong.code, ErrorCode::AuthInvalid);
}

#[tokio::test]
async fn test_delete_route_clears_cookie() {
    let app = TestApp::new().await;
    let (_, token) = app.signed_in("http-delete").await;

    let response = AxumTestRequest::delete("/api/account")
        .bearer(&token)
        .json(&json!({ "password": TEST_PASSWORD, "confirmation": "DELETE" }))
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    assert!(response
        .set_cookies()
        .iter()
        .any(|c| c.starts_with("session_token=;")));
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body["data"]["restoreDeadline"].is_string());
}

// ============================================================================
// Cleanup
// ============================================================================

#[tokio::test]
async fn test_cleanup_anonymizes_only_expired_deletions() {
    let app = TestApp::new().await;
    let now = Utc::now();

    let expired = app.register(&unique_email("expired")).await;
    app.resources
        .database
        .soft_delete_user(expired.id, now - Duration::days(31))
        .await
        .expect("backdated delete");

    let recent = app.register(&unique_email("recent")).await;
    app.resources
        .database
        .soft_delete_user(recent.id, now - Duration::days(29))
        .await
        .expect("recent delete");

    let active = app.register(&unique_email("active")).await;

    let summary = CleanupService::new(app.resources.clone())
        .cleanup_deleted_accounts(now)
        .await
        .expect("cleanup");
    assert!(summary.success);
    assert_eq!(summary.deleted_count, 1);
    assert!(summary.errors.is_empty());

    let anonymized = app.user(expired.id).await;
    assert!(anonymized.anonymized_at.is_some());
    assert!(anonymized.email.ends_with(ANONYMIZED_EMAIL_DOMAIN));
    assert!(anonymized.password_hash.is_none());
    assert!(anonymized.name.is_none());
    assert!(app
        .resources
        .database
        .get_user_by_email(&expired.email)
        .await
        .expect("query")
        .is_none());

    let pending = app.user(recent.id).await;
    assert!(pending.is_deleted);
    assert!(pending.anonymized_at.is_none());
    assert_eq!(pending.email, recent.email);
    assert!(!app.user(active.id).await.is_deleted);

    // A second run finds nothing left to do
    let again = CleanupService::new(app.resources.clone())
        .cleanup_deleted_accounts(now)
        .await
        .expect("cleanup");
    assert_eq!(again.deleted_count, 0);
}

#[tokio::test]
async fn test_cleanup_reports_failed_accounts_and_continues() {
    let dir = TempDir::new().expect("temp dir");
    let (app, side) = TestApp::on_disk(&dir).await;
    let now = Utc::now();

    let mut deleted = Vec::new();
    for prefix in ["first", "stuck", "last"] {
        let user = app.register(&unique_email(prefix)).await;
        app.resources
            .database
            .soft_delete_user(user.id, now - Duration::days(31))
            .await
            .expect("backdated delete");
        deleted.push(user);
    }
    let stuck = &deleted[1];
    sqlx::query(&format!(
        "CREATE TRIGGER refuse_anonymize BEFORE UPDATE ON users WHEN OLD.id = '{}' \
         BEGIN SELECT RAISE(ABORT, 'row is locked for maintenance'); END",
        stuck.id
    ))
    .execute(&side)
    .await
    .expect("trigger");

    let summary = CleanupService::new(app.resources.clone())
        .cleanup_deleted_accounts(now)
        .await
        .expect("cleanup");
    assert!(summary.success);
    assert_eq!(summary.deleted_count, 2);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].user_id, stuck.id);
    assert!(!summary.errors[0].error.is_empty());
    assert_eq!(summary.message, "Anonymized 2 deleted account(s); 1 failed");

    let kept = app.user(stuck.id).await;
    assert!(kept.is_deleted);
    assert!(kept.anonymized_at.is_none());
    assert_eq!(kept.email, stuck.email);
    for done in [&deleted[0], &deleted[2]] {
        assert!(app.user(done.id).await.anonymized_at.is_some());
    }
}

#[tokio::test]
async fn test_anonymized_account_cannot_be_restored() {
    let app = TestApp::new().await;
    let email = unique_email("gone");
    let user = app.register(&email).await;
    app.resources
        .database
        .soft_delete_user(user.id, Utc::now() - Duration::days(40))
        .await
        .expect("backdated delete");
    CleanupService::new(app.resources.clone())
        .cleanup_deleted_accounts(Utc::now())
        .await
        .expect("cleanup");

    let error = accounts(&app)
        .restore_account(
            RestoreAccountRequest {
                email,
                password: TEST_PASSWORD.to_owned(),
            },
            &unique_client(),
        )
        .await
        .expect_err("personal data is gone");
    assert_eq!(error.code, ErrorCode::AuthInvalid);
}

// ============================================================================
// Profile, sessions and linked accounts
// ============================================================================

#[tokio::test]
async fn test_update_profile_rejects_taken_username() {
    let app = TestApp::new().await;
    let (first, _) = app.signed_in("first").await;
    let (second, _) = app.signed_in("second").await;
    let handle = format!("user_{}", &first.user.id.simple().to_string()[..8]);

    let updated = accounts(&app)
        .update_profile(
            &first,
            UpdateProfileRequest {
                username: Some(handle.clone()),
                ..UpdateProfileRequest::default()
            },
        )
        .await
        .expect("claim username");
    assert_eq!(updated.username.as_deref(), Some(handle.as_str()));

    let error = accounts(&app)
        .update_profile(
            &second,
            UpdateProfileRequest {
                username: Some(handle),
                ..UpdateProfileRequest::default()
            },
        )
        .await
        .expect_err("taken");
    assert!(error.field_errors.contains_key("username"));
}

#[tokio::test]
async fn test_sessions_list_marks_current_and_revoke_is_owner_only() {
    let app = TestApp::new().await;
    let (caller, _) = app.signed_in("sessions").await;
    let second = app.login(&caller.user.email, TEST_PASSWORD).await;
    let second_session = app
        .auth()
        .authenticate(&second)
        .await
        .expect("session")
        .session;

    let sessions = accounts(&app).list_sessions(&caller).await.expect("list");
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions.iter().filter(|s| s.current).count(), 1);

    let (stranger, _) = app.signed_in("stranger").await;
    let error = accounts(&app)
        .revoke_session(&stranger, second_session.id)
        .await
        .expect_err("not the owner");
    assert_eq!(error.code, ErrorCode::PermissionDenied);

    accounts(&app)
        .revoke_session(&caller, second_session.id)
        .await
        .expect("revoke");
    assert!(app.auth().authenticate(&second).await.is_err());

    let missing = accounts(&app)
        .revoke_session(&caller, second_session.id)
        .await
        .expect_err("already gone");
    assert_eq!(missing.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_unlink_keeps_last_sign_in_method() {
    let app = TestApp::new().await;
    let database = &app.resources.database;

    let user = User::new(unique_email("oauth-only"), None, Some("Linked".to_owned()));
    database.create_user(&user).await.expect("create user");
    let github = LinkedAccount::new(user.id, "github", "gh-1", "oauth");
    database.create_linked_account(&github).await.expect("link");
    let session = Session::new(user.id, Duration::hours(1), None, None);
    database.create_session(&session).await.expect("session");
    let caller = AuthenticatedUser { user, session };

    let error = accounts(&app)
        .unlink_account(&caller, github.id)
        .await
        .expect_err("last method");
    assert_eq!(error.code, ErrorCode::InvalidInput);

    let google = LinkedAccount::new(caller.user.id, "google", "g-1", "oauth");
    database.create_linked_account(&google).await.expect("link");
    accounts(&app)
        .unlink_account(&caller, github.id)
        .await
        .expect("another method remains");

    let linked = accounts(&app)
        .list_linked_accounts(&caller)
        .await
        .expect("list");
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].provider, "google");
}
