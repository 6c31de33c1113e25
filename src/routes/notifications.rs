// ABOUTME: Route handlers for the caller's notification inbox
// ABOUTME: List, unread count, mark read and delete
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use uuid::Uuid;

use super::ok;
use crate::errors::AppError;
use crate::middleware::authenticate;
use crate::resources::ServerResources;
use crate::services::types::NotificationsQuery;
use crate::services::NotificationService;

/// Notification routes implementation
pub struct NotificationRoutes;

impl NotificationRoutes {
    /// Create all notification routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/notifications", get(Self::handle_list))
            .route(
                "/api/notifications/unread-count",
                get(Self::handle_unread_count),
            )
            .route(
                "/api/notifications/read-all",
                post(Self::handle_mark_all_read),
            )
            .route("/api/notifications/:id/read", post(Self::handle_mark_read))
            .route("/api/notifications/:id", delete(Self::handle_delete))
            .with_state(resources)
    }

    /// Handle GET /api/notifications
    async fn handle_list(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<NotificationsQuery>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let notifications = NotificationService::new(resources)
            .list(&caller, &query)
            .await?;
        Ok(ok(notifications))
    }

    /// Handle GET /api/notifications/unread-count
    async fn handle_unread_count(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let count = NotificationService::new(resources)
            .unread_count(&caller)
            .await?;
        Ok(ok(count))
    }

    /// Handle POST /api/notifications/:id/read
    async fn handle_mark_read(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(notification_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let notification = NotificationService::new(resources)
            .mark_read(&caller, notification_id)
            .await?;
        Ok(ok(notification))
    }

    /// Handle POST /api/notifications/read-all
    async fn handle_mark_all_read(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let updated = NotificationService::new(resources)
            .mark_all_read(&caller)
            .await?;
        Ok(ok(updated))
    }

    /// Handle DELETE /api/notifications/:id
    async fn handle_delete(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(notification_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let message = NotificationService::new(resources)
            .delete(&caller, notification_id)
            .await?;
        Ok(ok(message))
    }
}
