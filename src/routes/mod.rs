// ABOUTME: HTTP route modules of the account API, one group per feature area
// ABOUTME: Combines every group into a single router sharing `ServerResources`
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Routes
//!
//! Each group exposes `routes(resources) -> Router` and its handlers stay
//! thin: extract the caller and body, call the matching service, wrap the
//! result in an [`ActionResult`] envelope.

/// Profile, deletion, restore, sessions and linked accounts
pub mod account;
/// User administration
pub mod admin;
/// Registration, login, logout, session and email verification
pub mod auth;
/// Scheduled cleanup endpoint
pub mod cron;
/// Liveness and readiness probes
pub mod health;
/// Notification inbox
pub mod notifications;
/// Password reset, password change and email change
pub mod password;

use std::sync::Arc;

use account_core::action_result::ActionResult;
use account_core::errors::AppError;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use http::{header, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use account::AccountRoutes;
pub use admin::AdminRoutes;
pub use auth::AuthRoutes;
pub use cron::CronRoutes;
pub use health::HealthRoutes;
pub use notifications::NotificationRoutes;
pub use password::PasswordRoutes;

use crate::resources::ServerResources;

/// Every route of the API
pub fn router(resources: &Arc<ServerResources>) -> Router {
    Router::new()
        .merge(HealthRoutes::routes(resources.clone()))
        .merge(AuthRoutes::routes(resources.clone()))
        .merge(PasswordRoutes::routes(resources.clone()))
        .merge(AccountRoutes::routes(resources.clone()))
        .merge(NotificationRoutes::routes(resources.clone()))
        .merge(AdminRoutes::routes(resources.clone()))
        .merge(CronRoutes::routes(resources.clone()))
}

/// `200 OK` with a successful `ActionResult`
pub(crate) fn ok<T: Serialize>(value: T) -> Response {
    Json(ActionResult::ok(value)).into_response()
}

/// Append a `Set-Cookie` header to `response`
pub(crate) fn with_cookie(mut response: Response, cookie: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

/// JSON request body whose parse failures are reported as `INVALID_INPUT`
/// in an `ActionResult` instead of axum's plain-text rejection
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::invalid_input(rejection.body_text())),
        }
    }
}
