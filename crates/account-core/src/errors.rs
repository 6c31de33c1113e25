// ABOUTME: Unified error type, error codes and HTTP mapping for all account actions
// ABOUTME: Every failure in the server is an AppError carrying a stable machine-readable code
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Unified Error Handling System
//!
//! Centralized error handling for the account lifecycle server. Every
//! operation returns [`AppResult`], and every [`AppError`] maps to exactly one
//! HTTP status and one failure envelope (see [`crate::action_result`]).
//!
//! Validation failures carry per-field messages in `field_errors` so a client
//! can attach each message to the input that caused it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-field validation messages keyed by the camelCase request field name
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Authentication & Authorization (1000-1999)
    /// No session was presented
    AuthRequired = 1000,
    /// Credentials or session token are invalid
    AuthInvalid = 1001,
    /// Session has expired
    AuthExpired = 1002,
    /// Authenticated but not allowed
    PermissionDenied = 1004,

    // Rate Limiting (2000-2999)
    /// Too many attempts within the current window
    RateLimitExceeded = 2000,

    // Validation (3000-3999)
    /// Generic invalid input
    InvalidInput = 3000,
    /// One or more request fields failed validation
    ValidationFailed = 3001,
    /// Verification token unknown, already used or issued for another purpose
    TokenInvalid = 3010,
    /// Verification token past its expiry
    TokenExpired = 3011,

    // Resource Management (4000-4999)
    /// Requested record does not exist
    ResourceNotFound = 4000,
    /// Unique constraint would be violated
    ResourceAlreadyExists = 4001,

    // Account Lifecycle (4500-4599)
    /// Account is soft deleted and inside its grace period
    AccountDeleted = 4500,
    /// Account grace period elapsed and personal data was removed
    AccountAnonymized = 4501,

    // External Services (5000-5999)
    /// Email provider or other upstream failed
    ExternalServiceError = 5000,

    // Configuration (6000-6999)
    /// Required configuration missing or invalid
    ConfigError = 6000,

    // Internal Errors (9000-9999)
    /// Unexpected failure
    InternalError = 9000,
    /// Database operation failed
    DatabaseError = 9001,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput
            | Self::ValidationFailed
            | Self::TokenInvalid
            | Self::TokenExpired => 400,
            Self::AuthRequired | Self::AuthInvalid | Self::AuthExpired => 401,
            Self::PermissionDenied | Self::AccountDeleted => 403,
            Self::ResourceNotFound => 404,
            Self::ResourceAlreadyExists => 409,
            Self::AccountAnonymized => 410,
            Self::RateLimitExceeded => 429,
            Self::ExternalServiceError => 502,
            Self::ConfigError | Self::InternalError | Self::DatabaseError => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication is required to access this resource",
            Self::AuthInvalid => "The provided authentication credentials are invalid",
            Self::AuthExpired => "Your session has expired, please sign in again",
            Self::PermissionDenied => "You do not have permission to perform this action",
            Self::RateLimitExceeded => "Too many attempts. Please try again later",
            Self::InvalidInput => "The provided input is invalid",
            Self::ValidationFailed => "Please correct the highlighted fields",
            Self::TokenInvalid => "This link is invalid or has already been used",
            Self::TokenExpired => "This link has expired, please request a new one",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ResourceAlreadyExists => "A resource with this identifier already exists",
            Self::AccountDeleted => "This account is scheduled for deletion",
            Self::AccountAnonymized => "This account has been permanently deleted",
            Self::ExternalServiceError => "An external service encountered an error",
            Self::ConfigError => "Configuration error encountered",
            Self::InternalError => "An internal server error occurred",
            Self::DatabaseError => "Database operation failed",
        }
    }

    /// Whether the message may be shown to the caller verbatim
    ///
    /// Server-side failures are reported with the generic description so
    /// internals (SQL, upstream payloads) never reach the client.
    #[must_use]
    pub const fn is_client_facing(self) -> bool {
        self.http_status() < 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(ToOwned::to_owned))
            .unwrap_or_default();
        f.write_str(&name)
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Validation messages per request field
    pub field_errors: FieldErrors,
    /// Structured details (retry hints, deadlines)
    pub details: Option<serde_json::Value>,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field_errors: FieldErrors::new(),
            details: None,
            source: None,
        }
    }

    /// Attach structured details
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach a validation message to a single field
    #[must_use]
    pub fn with_field_error(
        mut self,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.field_errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Message safe to return to the caller
    #[must_use]
    pub fn public_message(&self) -> &str {
        if self.code.is_client_facing() {
            &self.message
        } else {
            self.code.description()
        }
    }

    /// Seconds the caller should wait before retrying, for rate limit errors
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        if self.code != ErrorCode::RateLimitExceeded {
            return None;
        }
        self.details
            .as_ref()
            .and_then(|d| d.get("retryAfter"))
            .and_then(serde_json::Value::as_u64)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Convenience functions for creating common errors
impl AppError {
    /// Authentication required
    #[must_use]
    pub fn auth_required() -> Self {
        Self::new(ErrorCode::AuthRequired, "Authentication required")
    }

    /// Invalid authentication
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Session expired
    #[must_use]
    pub fn auth_expired() -> Self {
        Self::new(ErrorCode::AuthExpired, "Session has expired")
    }

    /// Authenticated caller lacks permission
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// Rate limit exceeded
    #[must_use]
    pub fn rate_limit_exceeded(
        limit: u32,
        reset_at: chrono::DateTime<chrono::Utc>,
        retry_after_secs: u64,
    ) -> Self {
        Self::new(
            ErrorCode::RateLimitExceeded,
            format!(
                "Too many attempts. Please try again in {}",
                humanize_secs(retry_after_secs)
            ),
        )
        .with_details(serde_json::json!({
            "limit": limit,
            "resetAt": reset_at.to_rfc3339(),
            "retryAfter": retry_after_secs,
        }))
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Field level validation failure
    #[must_use]
    pub fn validation(field_errors: FieldErrors) -> Self {
        let mut error = Self::new(
            ErrorCode::ValidationFailed,
            ErrorCode::ValidationFailed.description(),
        );
        error.field_errors = field_errors;
        error
    }

    /// Verification token unknown or already consumed
    #[must_use]
    pub fn token_invalid() -> Self {
        Self::new(
            ErrorCode::TokenInvalid,
            ErrorCode::TokenInvalid.description(),
        )
    }

    /// Verification token expired
    #[must_use]
    pub fn token_expired() -> Self {
        Self::new(
            ErrorCode::TokenExpired,
            ErrorCode::TokenExpired.description(),
        )
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Resource already exists
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceAlreadyExists, message)
    }

    /// Account soft deleted and restorable until `restore_deadline`
    #[must_use]
    pub fn account_deleted(restore_deadline: chrono::DateTime<chrono::Utc>) -> Self {
        Self::new(
            ErrorCode::AccountDeleted,
            format!(
                "This account is scheduled for deletion. You can restore it until {}",
                restore_deadline.format("%Y-%m-%d")
            ),
        )
        .with_details(serde_json::json!({ "restoreDeadline": restore_deadline.to_rfc3339() }))
    }

    /// Account personal data already removed
    #[must_use]
    pub fn account_anonymized() -> Self {
        Self::new(
            ErrorCode::AccountAnonymized,
            ErrorCode::AccountAnonymized.description(),
        )
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// External service error
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }
}

fn humanize_secs(secs: u64) -> String {
    match secs {
        0..=59 => format!("{secs} seconds"),
        60..=3599 => format!("{} minutes", secs.div_ceil(60)),
        _ => format!("{} hours", secs.div_ceil(3600)),
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::internal(format!("Serialization failed: {error}")).with_source(error)
    }
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => Self::not_found("Record"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::already_exists("A record with this value already exists")
            }
            _ => Self::database(format!("Database error: {error}")),
        }
        .with_source(error)
    }
}

#[cfg(feature = "http-response")]
mod http_response {
    use axum::response::{IntoResponse, Response};
    use axum::Json;
    use http::{header, HeaderValue, StatusCode};

    use super::AppError;
    use crate::action_result::ActionResult;

    impl IntoResponse for AppError {
        fn into_response(self) -> Response {
            let status = StatusCode::from_u16(self.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                tracing::error!(code = %self.code, error = %self.message, "Request failed");
            } else {
                tracing::debug!(code = %self.code, error = %self.message, "Request rejected");
            }

            let retry_after = self.retry_after_secs();
            let body: ActionResult<()> = ActionResult::from_error(self);
            let mut response = (status, Json(body)).into_response();
            if let Some(secs) = retry_after {
                if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::AuthRequired.http_status(), 401);
        assert_eq!(ErrorCode::RateLimitExceeded.http_status(), 429);
        assert_eq!(ErrorCode::ResourceNotFound.http_status(), 404);
        assert_eq!(ErrorCode::AccountDeleted.http_status(), 403);
        assert_eq!(ErrorCode::AccountAnonymized.http_status(), 410);
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
    }

    #[test]
    fn test_error_code_display_matches_serde() {
        assert_eq!(
            ErrorCode::RateLimitExceeded.to_string(),
            "RATE_LIMIT_EXCEEDED"
        );
        assert_eq!(ErrorCode::TokenExpired.to_string(), "TOKEN_EXPIRED");
    }

    #[test]
    fn test_internal_errors_hide_message() {
        let error = AppError::database("UNIQUE constraint failed: users.email");
        assert_eq!(error.public_message(), "Database operation failed");

        let error = AppError::invalid_input("Email is required");
        assert_eq!(error.public_message(), "Email is required");
    }

    #[test]
    fn test_rate_limit_error_carries_retry_after() {
        let error = AppError::rate_limit_exceeded(5, chrono::Utc::now(), 120);
        assert_eq!(error.retry_after_secs(), Some(120));
        assert!(error.message.contains("2 minutes"));

        assert_eq!(AppError::internal("x").retry_after_secs(), None);
    }

    #[test]
    fn test_field_errors_accumulate() {
        let error = AppError::validation(FieldErrors::new())
            .with_field_error("email", "Invalid email address")
            .with_field_error("email", "Email is already registered");
        assert_eq!(error.field_errors["email"].len(), 2);
        assert_eq!(error.code, ErrorCode::ValidationFailed);
    }
}
