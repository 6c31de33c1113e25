// ABOUTME: Route handlers for password reset, password change and email address change
// ABOUTME: Reset and email confirmation are authorized by the emailed token, not a session
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::Response, routing::post, Router};

use super::{ok, JsonBody};
use crate::errors::AppError;
use crate::middleware::{authenticate, client_context, throttled_response};
use crate::resources::ServerResources;
use crate::services::types::{
    ChangePasswordRequest, EmailChangeRequest, ForgotPasswordRequest, ResetPasswordRequest,
    TokenRequest,
};
use crate::services::{EmailChangeService, PasswordService};

/// Credential change routes implementation
pub struct PasswordRoutes;

impl PasswordRoutes {
    /// Create password and email change routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/api/auth/forgot-password",
                post(Self::handle_forgot_password),
            )
            .route(
                "/api/auth/reset-password",
                post(Self::handle_reset_password),
            )
            .route("/api/account/password", post(Self::handle_change_password))
            .route(
                "/api/account/email",
                post(Self::handle_request_email_change),
            )
            .route(
                "/api/account/email/confirm",
                post(Self::handle_confirm_email_change),
            )
            .with_state(resources)
    }

    /// Handle POST /api/auth/forgot-password
    async fn handle_forgot_password(
        State(resources): State<Arc<ServerResources>>,
        JsonBody(body): JsonBody<ForgotPasswordRequest>,
    ) -> Response {
        throttled_response(PasswordService::new(resources).request_reset(body).await)
    }

    /// Handle POST /api/auth/reset-password
    async fn handle_reset_password(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<ResetPasswordRequest>,
    ) -> Response {
        let client = client_context(&headers);
        throttled_response(
            PasswordService::new(resources)
                .reset_password(body, &client)
                .await,
        )
    }

    /// Handle POST /api/account/password
    async fn handle_change_password(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<ChangePasswordRequest>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        Ok(throttled_response(
            PasswordService::new(resources)
                .change_password(&caller, body)
                .await,
        ))
    }

    /// Handle POST /api/account/email
    async fn handle_request_email_change(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<EmailChangeRequest>,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        Ok(throttled_response(
            EmailChangeService::new(resources)
                .request_change(&caller, body)
                .await,
        ))
    }

    /// Handle POST /api/account/email/confirm
    async fn handle_confirm_email_change(
        State(resources): State<Arc<ServerResources>>,
        JsonBody(body): JsonBody<TokenRequest>,
    ) -> Result<Response, AppError> {
        let user = EmailChangeService::new(resources)
            .confirm_change(body)
            .await?;
        Ok(ok(user))
    }
}
