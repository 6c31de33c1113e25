// ABOUTME: Health check route handlers for service monitoring and status endpoints
// ABOUTME: Liveness is static; readiness probes the database and the rate limit store
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Health check routes
//!
//! `/ready` returns 503 only when the database is unreachable. The rate
//! limiter fails open, so an unreachable store is reported as `degraded`
//! without taking the instance out of rotation.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::database_plugins::DatabaseProvider;
use crate::resources::ServerResources;

/// Health routes implementation
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create all health check routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/health", get(Self::handle_health))
            .route("/ready", get(Self::handle_ready))
            .with_state(resources)
    }

    async fn handle_health() -> Json<serde_json::Value> {
        Json(json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }

    async fn handle_ready(State(resources): State<Arc<ServerResources>>) -> Response {
        let database = resources.database.health_check().await;
        let rate_limit = resources.rate_limiter.health_check().await;

        let status = if database.is_err() {
            "not_ready"
        } else if rate_limit.is_err() {
            "degraded"
        } else {
            "ready"
        };
        let code = if database.is_ok() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };

        let body = json!({
            "status": status,
            "checks": {
                "database": {
                    "backend": resources.database.backend_info(),
                    "healthy": database.is_ok(),
                },
                "rateLimit": {
                    "backend": resources.rate_limiter.backend_name(),
                    "healthy": rate_limit.is_ok(),
                },
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        (code, Json(body)).into_response()
    }
}
