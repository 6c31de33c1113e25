// ABOUTME: Integration tests for the admin user management API and CLI operations
// ABOUTME: Covers the admin role check, listing with deleted accounts, role changes and restore
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use account_core::errors::ErrorCode;
use account_core::models::UserRole;
use account_server::database_plugins::DatabaseProvider;
use account_server::services::types::ListUsersQuery;
use account_server::services::AdminService;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{unique_email, TestApp, TEST_PASSWORD};
use helpers::axum_test::AxumTestRequest;
use serde_json::{json, Value};
use tempfile::TempDir;

fn admin(app: &TestApp) -> AdminService {
    AdminService::new(app.resources.clone())
}

#[tokio::test]
async fn test_admin_routes_reject_regular_users() {
    let app = TestApp::new().await;
    let (_, token) = app.signed_in("regular").await;

    let response = AxumTestRequest::get("/api/admin/users")
        .bearer(&token)
        .send(app.router())
        .await
        .assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "PERMISSION_DENIED");

    AxumTestRequest::get("/api/admin/users")
        .send(app.router())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_users_hides_deleted_unless_asked() {
    let app = TestApp::new().await;
    let (caller, token) = app.signed_in_admin().await;
    let deleted = app.register(&unique_email("listed-deleted")).await;
    app.resources
        .database
        .soft_delete_user(deleted.id, Utc::now())
        .await
        .expect("delete");

    let active_only = admin(&app)
        .list_users(&caller, ListUsersQuery::default())
        .await
        .expect("list");
    assert!(active_only.users.iter().all(|u| !u.is_deleted));
    assert!(active_only.users.iter().any(|u| u.id == caller.user.id));

    let response = AxumTestRequest::get("/api/admin/users?includeDeleted=true")
        .bearer(&token)
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    let users = body["data"]["users"].as_array().expect("users");
    assert!(users
        .iter()
        .any(|u| u["id"] == deleted.id.to_string() && u["isDeleted"] == true));
    assert!(body["data"]["total"].as_i64().expect("total") >= 2);
}

#[tokio::test]
async fn test_list_users_total_counts_search_matches_only() {
    let app = TestApp::new().await;
    let (caller, token) = app.signed_in_admin().await;
    for _ in 0..3 {
        app.register(&unique_email("noise")).await;
    }
    let needle = app.register(&unique_email("needle-xyz")).await;

    let found = admin(&app)
        .list_users(
            &caller,
            ListUsersQuery {
                search: Some("needle-xyz".to_owned()),
                ..ListUsersQuery::default()
            },
        )
        .await
        .expect("search");
    assert_eq!(found.users.len(), 1);
    assert_eq!(found.users[0].id, needle.id);
    assert_eq!(found.total, 1);

    // The total covers every match, not just the page
    let response = AxumTestRequest::get("/api/admin/users?search=NOISE&limit=1")
        .bearer(&token)
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"]["users"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["total"], 3);
}

#[tokio::test]
async fn test_set_role_promotes_others_but_not_self() {
    let app = TestApp::new().await;
    let (caller, token) = app.signed_in_admin().await;
    let target = app.register(&unique_email("target")).await;

    let response = AxumTestRequest::patch(&format!("/api/admin/users/{}/role", target.id))
        .bearer(&token)
        .json(&json!({ "role": "admin" }))
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"]["role"], "admin");
    assert_eq!(app.user(target.id).await.role, UserRole::Admin);

    let error = admin(&app)
        .set_role(&caller, caller.user.id, UserRole::User)
        .await
        .expect_err("own role");
    assert_eq!(error.code, ErrorCode::PermissionDenied);
}

#[tokio::test]
async fn test_admin_restores_user_within_grace_period_only() {
    let app = TestApp::new().await;
    let (caller, _) = app.signed_in_admin().await;
    let now = Utc::now();

    let pending = app.register(&unique_email("pending")).await;
    app.resources
        .database
        .soft_delete_user(pending.id, now - Duration::days(3))
        .await
        .expect("delete");
    let restored = admin(&app)
        .restore_user(&caller, pending.id)
        .await
        .expect("restore");
    assert!(!restored.is_deleted);
    app.login(&pending.email, TEST_PASSWORD).await;

    let expired = app.register(&unique_email("expired")).await;
    app.resources
        .database
        .soft_delete_user(expired.id, now - Duration::days(45))
        .await
        .expect("delete");
    let error = admin(&app)
        .restore_user(&caller, expired.id)
        .await
        .expect_err("past the grace period");
    assert_eq!(error.code, ErrorCode::AccountAnonymized);

    let missing = admin(&app)
        .get_user(&caller, uuid::Uuid::new_v4())
        .await
        .expect_err("unknown user");
    assert_eq!(missing.code, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_admin_restore_loses_race_with_cleanup() {
    let dir = TempDir::new().expect("temp dir");
    let (app, side) = TestApp::on_disk(&dir).await;
    let (caller, _) = app.signed_in_admin().await;
    let target = app.register(&unique_email("raced")).await;
    app.resources
        .database
        .soft_delete_user(target.id, Utc::now() - Duration::days(2))
        .await
        .expect("delete");

    // Anonymize the row as the restore statement reaches it, then skip the restore
    sqlx::query(&format!(
        "CREATE TRIGGER cleanup_wins BEFORE UPDATE OF is_deleted ON users \
         WHEN OLD.id = '{}' AND NEW.is_deleted = 0 BEGIN \
         UPDATE users SET anonymized_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
         WHERE id = OLD.id; SELECT RAISE(IGNORE); END",
        target.id
    ))
    .execute(&side)
    .await
    .expect("trigger");

    let error = admin(&app)
        .restore_user(&caller, target.id)
        .await
        .expect_err("anonymized before the restore landed");
    assert_eq!(error.code, ErrorCode::AccountAnonymized);
    let stored = app.user(target.id).await;
    assert!(stored.is_deleted);
    assert!(stored.anonymized_at.is_some());
}

#[tokio::test]
async fn test_cli_promote_and_create_admin() {
    let app = TestApp::new().await;
    let email = unique_email("cli");
    app.register(&email).await;

    let promoted = admin(&app).promote(&email).await.expect("promote");
    assert_eq!(promoted.role, UserRole::Admin);

    let missing = admin(&app)
        .promote(&unique_email("nobody"))
        .await
        .expect_err("no such account");
    assert_eq!(missing.code, ErrorCode::ResourceNotFound);

    let created_email = unique_email("created");
    let created = admin(&app)
        .create_admin(&created_email, TEST_PASSWORD)
        .await
        .expect("create");
    assert_eq!(created.role, UserRole::Admin);
    assert!(created.email_verified);
    app.login(&created_email, TEST_PASSWORD).await;

    let duplicate = admin(&app)
        .create_admin(&created_email, TEST_PASSWORD)
        .await
        .expect_err("taken");
    assert_eq!(duplicate.code, ErrorCode::ResourceAlreadyExists);

    let weak = admin(&app)
        .create_admin(&unique_email("weak"), "short")
        .await
        .expect_err("weak password");
    assert_eq!(weak.code, ErrorCode::ValidationFailed);
}
