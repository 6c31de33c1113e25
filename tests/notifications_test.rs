// ABOUTME: Integration tests for the notification inbox routes
// ABOUTME: Covers listing, unread counts, marking read, deleting and ownership checks
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use account_core::models::{Notification, NotificationKind};
use account_server::database_plugins::DatabaseProvider;
use axum::http::StatusCode;
use common::TestApp;
use helpers::axum_test::AxumTestRequest;
use serde_json::Value;
use uuid::Uuid;

async fn seed(app: &TestApp, user_id: Uuid, count: usize) -> Vec<Notification> {
    let mut seeded = Vec::with_capacity(count);
    for i in 0..count {
        let notification = Notification::new(
            user_id,
            NotificationKind::Security,
            format!("Notice {i}"),
            "Something happened on your account.",
        );
        app.resources
            .database
            .create_notification(&notification)
            .await
            .expect("seed notification");
        seeded.push(notification);
    }
    seeded
}

async fn unread_count(app: &TestApp, token: &str) -> i64 {
    let response = AxumTestRequest::get("/api/notifications/unread-count")
        .bearer(token)
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    body["data"]["count"].as_i64().expect("count")
}

#[tokio::test]
async fn test_list_and_unread_filter() {
    let app = TestApp::new().await;
    let (caller, token) = app.signed_in("inbox").await;
    let seeded = seed(&app, caller.user.id, 3).await;

    let response = AxumTestRequest::get("/api/notifications")
        .bearer(&token)
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().expect("list").len(), 3);
    assert_eq!(unread_count(&app, &token).await, 3);

    AxumTestRequest::post(&format!("/api/notifications/{}/read", seeded[0].id))
        .bearer(&token)
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    assert_eq!(unread_count(&app, &token).await, 2);

    let response = AxumTestRequest::get("/api/notifications?unreadOnly=true&limit=1")
        .bearer(&token)
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    let unread = body["data"].as_array().expect("list");
    assert_eq!(unread.len(), 1);
    assert!(unread[0]["readAt"].is_null());
}

#[tokio::test]
async fn test_mark_all_read_and_delete() {
    let app = TestApp::new().await;
    let (caller, token) = app.signed_in("bulk").await;
    let seeded = seed(&app, caller.user.id, 2).await;

    let response = AxumTestRequest::post("/api/notifications/read-all")
        .bearer(&token)
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(unread_count(&app, &token).await, 0);

    AxumTestRequest::delete(&format!("/api/notifications/{}", seeded[1].id))
        .bearer(&token)
        .send(app.router())
        .await
        .assert_status(StatusCode::OK);
    AxumTestRequest::delete(&format!("/api/notifications/{}", seeded[1].id))
        .bearer(&token)
        .send(app.router())
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notifications_of_others_are_forbidden() {
    let app = TestApp::new().await;
    let (owner, _) = app.signed_in("owner").await;
    let (_, intruder_token) = app.signed_in("intruder").await;
    let seeded = seed(&app, owner.user.id, 1).await;

    let response = AxumTestRequest::post(&format!("/api/notifications/{}/read", seeded[0].id))
        .bearer(&intruder_token)
        .send(app.router())
        .await
        .assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "PERMISSION_DENIED");

    AxumTestRequest::delete(&format!("/api/notifications/{}", seeded[0].id))
        .bearer(&intruder_token)
        .send(app.router())
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let stored = app
        .resources
        .database
        .get_notification(seeded[0].id)
        .await
        .expect("query")
        .expect("still there");
    assert!(!stored.is_read());
}

#[tokio::test]
async fn test_inbox_requires_authentication() {
    let app = TestApp::new().await;
    AxumTestRequest::get("/api/notifications")
        .send(app.router())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
