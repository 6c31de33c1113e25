// ABOUTME: Route handlers for user administration
// ABOUTME: Every handler requires a session whose account has the admin role
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use uuid::Uuid;

use super::{ok, JsonBody};
use crate::errors::AppError;
use crate::middleware::authenticate;
use crate::resources::ServerResources;
use crate::services::types::{ListUsersQuery, UpdateRoleRequest};
use crate::services::AdminService;

/// Admin routes implementation
pub struct AdminRoutes;

impl AdminRoutes {
    /// Create all admin routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/admin/users", get(Self::handle_list_users))
            .route("/api/admin/users/:id", get(Self::handle_get_user))
            .route("/api/admin/users/:id/role", patch(Self::handle_set_role))
            .route(
                "/api/admin/users/:id/restore",
                post(Self::handle_restore_user),
            )
            .with_state(resources)
    }

    /// Handle GET /api/admin/users
    async fn handle_list_users(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Query(query): Query<ListUsersQuery>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let users = AdminService::new(resources)
            .list_users(&caller, query)
            .await?;
        Ok(ok(users))
    }

    /// Handle GET /api/admin/users/:id
    async fn handle_get_user(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(user_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let user = AdminService::new(resources)
            .get_user(&caller, user_id)
            .await?;
        Ok(ok(user))
    }

    /// Handle PATCH /api/admin/users/:id/role
    async fn handle_set_role(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(user_id): Path<Uuid>,
        JsonBody(body): JsonBody<UpdateRoleRequest>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let user = AdminService::new(resources)
            .set_role(&caller, user_id, body.role)
            .await?;
        Ok(ok(user))
    }

    /// Handle POST /api/admin/users/:id/restore
    async fn handle_restore_user(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(user_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let user = AdminService::new(resources)
            .restore_user(&caller, user_id)
            .await?;
        Ok(ok(user))
    }
}
