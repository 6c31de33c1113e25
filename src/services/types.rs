// ABOUTME: Request and response bodies of the account actions
// ABOUTME: Requests derive validator rules; every body is camelCase JSON
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![allow(missing_docs)]

use account_core::constants::limits;
use account_core::models::{PublicUser, Session, SessionView, User, UserRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::{
    validate_delete_confirmation, validate_image_url, validate_name, validate_password,
    validate_username,
};

/// Caller resolved from a session token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Account making the request
    pub user: User,
    /// Session the token refers to
    pub session: Session,
}

/// Where a request came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    /// Client IP, or `unknown` when no proxy header names one
    pub ip: String,
    /// `User-Agent` header
    pub user_agent: Option<String>,
}

impl ClientContext {
    /// Context for callers without HTTP metadata (CLI, tests)
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            ip: "unknown".to_owned(),
            user_agent: None,
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        email(message = "Invalid email address"),
        length(max = limits::EMAIL_MAX_LENGTH, message = "Email is too long")
    )]
    pub email: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    #[validate(
        custom(function = "validate_name"),
        length(max = limits::NAME_MAX_LENGTH, message = "Name must be at most 100 characters")
    )]
    pub name: Option<String>,
    #[validate(custom(function = "validate_username"))]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Body carrying only an emailed token
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(custom(function = "validate_password"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmailChangeRequest {
    #[validate(
        email(message = "Invalid email address"),
        length(max = limits::EMAIL_MAX_LENGTH, message = "Email is too long")
    )]
    pub new_email: String,
    /// Required when the account has a password
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(
        custom(function = "validate_name"),
        length(max = limits::NAME_MAX_LENGTH, message = "Name must be at most 100 characters")
    )]
    pub name: Option<String>,
    #[validate(custom(function = "validate_username"))]
    pub username: Option<String>,
    #[validate(
        custom(function = "validate_image_url"),
        length(max = limits::IMAGE_URL_MAX_LENGTH, message = "Image URL is too long")
    )]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    /// Required when the account has a password
    pub password: Option<String>,
    #[validate(custom(function = "validate_delete_confirmation"))]
    pub confirmation: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RestoreAccountRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Admin account created from the command line
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub role: UserRole,
}

/// Query string of the admin user listing
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    #[serde(default)]
    pub include_deleted: bool,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Query string of the notification listing
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u32>,
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`
#[must_use]
pub fn page_size(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(limits::DEFAULT_PAGE_SIZE)
        .clamp(1, limits::MAX_PAGE_SIZE)
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: PublicUser,
    pub message: String,
}

/// Result of a successful sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicUser,
    /// Session token, also set as the session cookie
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: PublicUser,
    pub session: SessionView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionScheduledResponse {
    pub message: String,
    pub restore_deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub user: PublicUser,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<PublicUser>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}
