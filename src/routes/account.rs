// ABOUTME: Route handlers for the caller's own account
// ABOUTME: Profile, soft deletion and restore, sessions and linked sign-in methods
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Account routes
//!
//! Everything except restore requires a live session. Restore takes the
//! account credentials because a soft-deleted account cannot sign in.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use uuid::Uuid;

use super::{ok, with_cookie, JsonBody};
use crate::errors::AppError;
use crate::middleware::{authenticate, client_context, throttled_response};
use crate::resources::ServerResources;
use crate::security::cookies::clear_session_cookie;
use crate::services::types::{DeleteAccountRequest, RestoreAccountRequest, UpdateProfileRequest};
use crate::services::AccountService;

/// Account routes implementation
pub struct AccountRoutes;

impl AccountRoutes {
    /// Create all account routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/account", delete(Self::handle_delete_account))
            .route(
                "/api/account/profile",
                get(Self::handle_get_profile).patch(Self::handle_update_profile),
            )
            .route("/api/account/restore", post(Self::handle_restore_account))
            .route("/api/account/sessions", get(Self::handle_list_sessions))
            .route(
                "/api/account/sessions/:id",
                delete(Self::handle_revoke_session),
            )
            .route(
                "/api/account/linked-accounts",
                get(Self::handle_list_linked_accounts),
            )
            .route(
                "/api/account/linked-accounts/:id",
                delete(Self::handle_unlink_account),
            )
            .with_state(resources)
    }

    /// Handle GET /api/account/profile
    async fn handle_get_profile(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        Ok(ok(AccountService::get_profile(&caller)?))
    }

    /// Handle PATCH /api/account/profile
    async fn handle_update_profile(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<UpdateProfileRequest>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let user = AccountService::new(resources)
            .update_profile(&caller, body)
            .await?;
        Ok(ok(user))
    }

    /// Handle DELETE /api/account
    ///
    /// Every session is revoked, so the cookie is cleared on success.
    async fn handle_delete_account(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<DeleteAccountRequest>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let secure = resources.secure_cookies();
        let result = AccountService::new(resources)
            .delete_account(&caller, body)
            .await;
        let deleted = result.is_ok();
        let response = throttled_response(result);
        Ok(if deleted {
            with_cookie(response, &clear_session_cookie(secure))
        } else {
            response
        })
    }

    /// Handle POST /api/account/restore
    async fn handle_restore_account(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<RestoreAccountRequest>,
    ) -> Response {
        let client = client_context(&headers);
        throttled_response(
            AccountService::new(resources)
                .restore_account(body, &client)
                .await,
        )
    }

    /// Handle GET /api/account/sessions
    async fn handle_list_sessions(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let sessions = AccountService::new(resources).list_sessions(&caller).await?;
        Ok(ok(sessions))
    }

    /// Handle DELETE /api/account/sessions/:id
    async fn handle_revoke_session(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(session_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let message = AccountService::new(resources)
            .revoke_session(&caller, session_id)
            .await?;
        Ok(ok(message))
    }

    /// Handle GET /api/account/linked-accounts
    async fn handle_list_linked_accounts(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let accounts = AccountService::new(resources)
            .list_linked_accounts(&caller)
            .await?;
        Ok(ok(accounts))
    }

    /// Handle DELETE /api/account/linked-accounts/:id
    async fn handle_unlink_account(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(account_id): Path<Uuid>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        let message = AccountService::new(resources)
            .unlink_account(&caller, account_id)
            .await?;
        Ok(ok(message))
    }
}
