// ABOUTME: Route handlers for registration, login, logout and email verification
// ABOUTME: Login sets the httpOnly session cookie and logout clears it
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Authentication routes
//!
//! Session tokens are returned in the login body and also set as the
//! `session_token` cookie, so browsers and API clients use the same flow.

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::Utc;

use super::{ok, with_cookie, JsonBody};
use crate::errors::AppError;
use crate::middleware::{authenticate, client_context, throttled_response};
use crate::resources::ServerResources;
use crate::security::cookies::{clear_session_cookie, session_cookie};
use crate::services::types::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, TokenRequest,
};
use crate::services::AuthService;

/// Authentication routes implementation
pub struct AuthRoutes;

impl AuthRoutes {
    /// Create all authentication routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/auth/register", post(Self::handle_register))
            .route("/api/auth/login", post(Self::handle_login))
            .route("/api/auth/logout", post(Self::handle_logout))
            .route("/api/auth/session", get(Self::handle_session))
            .route("/api/auth/verify-email", post(Self::handle_verify_email))
            .route(
                "/api/auth/resend-verification",
                post(Self::handle_resend_verification),
            )
            .with_state(resources)
    }

    /// Handle POST /api/auth/register
    async fn handle_register(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<RegisterRequest>,
    ) -> Response {
        let client = client_context(&headers);
        throttled_response(AuthService::new(resources).register(body, &client).await)
    }

    /// Handle POST /api/auth/login
    async fn handle_login(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        JsonBody(body): JsonBody<LoginRequest>,
    ) -> Response {
        let client = client_context(&headers);
        let secure = resources.secure_cookies();
        match AuthService::new(resources).login(body, &client).await {
            Ok(throttled) => {
                let max_age = (throttled.value.expires_at - Utc::now())
                    .num_seconds()
                    .max(0);
                let cookie = session_cookie(&throttled.value.token, max_age, secure);
                with_cookie(throttled_response(Ok(throttled)), &cookie)
            }
            Err(error) => throttled_response::<LoginResponse>(Err(error)),
        }
    }

    /// Handle POST /api/auth/logout
    ///
    /// The cookie is cleared even when the session is already gone.
    async fn handle_logout(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let message = match authenticate(&headers, &resources).await {
            Ok(caller) => AuthService::new(resources.clone()).logout(&caller).await?,
            Err(_) => MessageResponse::new("Signed out"),
        };
        Ok(with_cookie(
            ok(message),
            &clear_session_cookie(resources.secure_cookies()),
        ))
    }

    /// Handle GET /api/auth/session
    async fn handle_session(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        Ok(ok(AuthService::session_info(&caller)))
    }

    /// Handle POST /api/auth/verify-email
    async fn handle_verify_email(
        State(resources): State<Arc<ServerResources>>,
        JsonBody(body): JsonBody<TokenRequest>,
    ) -> Result<Response, AppError> {
        let message = AuthService::new(resources).verify_email(body).await?;
        Ok(ok(message))
    }

    /// Handle POST /api/auth/resend-verification
    async fn handle_resend_verification(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let caller = authenticate(&headers, &resources).await?;
        Ok(throttled_response(
            AuthService::new(resources)
                .resend_verification(&caller)
                .await,
        ))
    }
}
