// ABOUTME: Scheduled cleanup endpoint called by the platform cron
// ABOUTME: Authorized by a shared bearer secret compared in constant time
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Cron routes
//!
//! `GET /api/cron/cleanup-deleted-accounts` runs the anonymization job and
//! returns its summary as the raw body (no `ActionResult` envelope), which is
//! what schedulers log.

use std::sync::Arc;

use account_core::constants::routes::CRON_CLEANUP_DELETED_ACCOUNTS;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tracing::warn;

use crate::errors::AppError;
use crate::logging::AppLogger;
use crate::middleware::auth::bearer_token;
use crate::resources::ServerResources;
use crate::security::tokens::constant_time_eq;
use crate::services::{CleanupService, CleanupSummary};

/// Cron routes implementation
pub struct CronRoutes;

impl CronRoutes {
    /// Create the cron routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                CRON_CLEANUP_DELETED_ACCOUNTS,
                get(Self::handle_cleanup_deleted_accounts),
            )
            .with_state(resources)
    }

    /// Check the bearer secret of a cron call
    fn authorize(headers: &HeaderMap, resources: &ServerResources) -> Result<(), AppError> {
        let Some(secret) = resources.config.lifecycle.cron_secret.as_deref() else {
            return Err(AppError::config("CRON_SECRET is not configured"));
        };
        let presented = bearer_token(headers).unwrap_or_default();
        if constant_time_eq(&presented, secret) {
            Ok(())
        } else {
            AppLogger::log_security_event(
                "cron_unauthorized",
                "warning",
                "cleanup endpoint called without a valid secret",
                None,
            );
            Err(AppError::auth_invalid("Unauthorized"))
        }
    }

    /// Handle GET /api/cron/cleanup-deleted-accounts
    async fn handle_cleanup_deleted_accounts(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        Self::authorize(&headers, &resources)?;

        match CleanupService::new(resources)
            .cleanup_deleted_accounts(Utc::now())
            .await
        {
            Ok(summary) => Ok((StatusCode::OK, Json(summary)).into_response()),
            Err(error) => {
                warn!("Deleted account cleanup failed: {}", error.message);
                let summary = CleanupSummary {
                    success: false,
                    deleted_count: 0,
                    errors: Vec::new(),
                    message: error.public_message().to_owned(),
                };
                Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(summary)).into_response())
            }
        }
    }
}
