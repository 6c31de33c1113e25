// ABOUTME: Uniform success/failure envelope returned by every account action
// ABOUTME: Serializes to {success:true,data} or {success:false,error,code,fieldErrors?}
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::errors::{AppError, AppResult, ErrorCode, FieldErrors};

/// Result envelope of an account action
///
/// Callers branch on `success` only; a failure always carries a message that
/// can be shown as-is and, for validation failures, messages per field.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult<T> {
    /// Action completed
    Success(T),
    /// Action rejected or failed
    Failure {
        /// Message safe to display
        error: String,
        /// Stable machine-readable code
        code: ErrorCode,
        /// Validation messages keyed by field
        field_errors: FieldErrors,
        /// Structured details such as a retry hint
        details: Option<serde_json::Value>,
    },
}

impl<T> ActionResult<T> {
    /// Wrap a successful value
    pub const fn ok(data: T) -> Self {
        Self::Success(data)
    }

    /// Build the failure envelope for an error
    #[must_use]
    pub fn from_error(error: AppError) -> Self {
        Self::Failure {
            error: error.public_message().to_owned(),
            code: error.code,
            field_errors: error.field_errors,
            details: error.details,
        }
    }

    /// Whether the action succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl<T> From<AppResult<T>> for ActionResult<T> {
    fn from(result: AppResult<T>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(error) => Self::from_error(error),
        }
    }
}

impl<T: Serialize> Serialize for ActionResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success(data) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
                map.end()
            }
            Self::Failure {
                error,
                code,
                field_errors,
                details,
            } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                map.serialize_entry("code", code)?;
                if !field_errors.is_empty() {
                    map.serialize_entry("fieldErrors", field_errors)?;
                }
                if let Some(details) = details {
                    map.serialize_entry("details", details)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(feature = "http-response")]
impl<T: Serialize> axum::response::IntoResponse for ActionResult<T> {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::Success(_) => http::StatusCode::OK,
            Self::Failure { code, .. } => http::StatusCode::from_u16(code.http_status())
                .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR),
        };
        (status, axum::Json(self)).into_response()
    }
}
