// ABOUTME: Account actions: validation, rate limiting, persistence and side effects
// ABOUTME: Route handlers and the admin CLI call these services; they never touch HTTP types
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Domain service layer
//!
//! Every action runs the same pipeline: validate the request, consult the
//! rate limiter, change the database, then perform side effects. Side effects
//! (emails, notifications) run after the database change has committed and
//! their failures are logged rather than returned.

/// Profile, deletion, restore, sessions and linked accounts
pub mod account;
/// User administration
pub mod admin;
/// Registration, sign-in, sessions and email verification
pub mod auth;
/// Anonymization of accounts past their grace period
pub mod cleanup;
/// Email address change
pub mod email_change;
/// In-app notifications
pub mod notifications;
/// Password reset and change
pub mod password;
/// Request and response bodies
pub mod types;

use account_core::errors::{AppError, AppResult};
use account_core::models::{Notification, NotificationKind, TokenPurpose, VerificationToken};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::database_plugins::{factory::Database, DatabaseProvider};
use crate::security::tokens::{generate_token, hash_token};

pub use account::AccountService;
pub use admin::AdminService;
pub use auth::AuthService;
pub use cleanup::{CleanupService, CleanupSummary};
pub use email_change::EmailChangeService;
pub use notifications::NotificationService;
pub use password::PasswordService;
pub use types::{AuthenticatedUser, ClientContext};

/// Store a fresh token for `purpose`, replacing older ones, and return the plain value to email
///
/// # Errors
///
/// Returns a database error if the token cannot be stored
pub(crate) async fn issue_token(
    database: &Database,
    user_id: Uuid,
    purpose: TokenPurpose,
    new_email: Option<String>,
) -> AppResult<String> {
    let issued = generate_token();
    let record = VerificationToken::new(user_id, purpose, issued.hash, new_email);
    database.store_verification_token(&record).await?;
    Ok(issued.token)
}

/// Look up and spend a one-time token
///
/// The row is deleted on success so a second presentation fails with
/// `TOKEN_INVALID`; an expired token is deleted as well.
///
/// # Errors
///
/// Returns `TOKEN_INVALID` for unknown or already used tokens and
/// `TOKEN_EXPIRED` for expired ones
pub(crate) async fn consume_token(
    database: &Database,
    token: &str,
    purpose: TokenPurpose,
) -> AppResult<VerificationToken> {
    let record = database
        .find_verification_token(&hash_token(token), purpose)
        .await?
        .ok_or_else(AppError::token_invalid)?;

    if record.is_expired(Utc::now()) {
        database.delete_verification_token(record.id).await?;
        return Err(AppError::token_expired());
    }

    // Losing this race means another request spent the token first
    if !database.delete_verification_token(record.id).await? {
        return Err(AppError::token_invalid());
    }
    Ok(record)
}

/// Record an in-app notification; failures are logged, never returned
pub(crate) async fn notify(
    database: &Database,
    user_id: Uuid,
    kind: NotificationKind,
    title: &str,
    body: &str,
) {
    let notification = Notification::new(user_id, kind, title, body);
    if let Err(e) = database.create_notification(&notification).await {
        warn!(
            user.id = %user_id,
            kind = kind.as_str(),
            "Failed to create notification: {}",
            e.message
        );
    }
}
