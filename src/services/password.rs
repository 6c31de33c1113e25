// ABOUTME: Password reset by emailed link and authenticated password change
// ABOUTME: Both revoke sessions so a leaked password stops working everywhere
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use account_core::constants::{messages, routes};
use account_core::errors::{AppError, AppResult, FieldErrors};
use account_core::models::{AccountState, NotificationKind, TokenPurpose, User};
use account_core::permissions::{define_abilities_for, Actions};
use chrono::Utc;

use super::types::{
    AuthenticatedUser, ChangePasswordRequest, ClientContext, ForgotPasswordRequest,
    MessageResponse, ResetPasswordRequest,
};
use super::{consume_token, issue_token, notify};
use crate::database_plugins::DatabaseProvider;
use crate::email::EmailTemplate;
use crate::logging::AppLogger;
use crate::middleware::rate_limiting::Throttled;
use crate::rate_limiting::RateLimitAction;
use crate::resources::ServerResources;
use crate::security::passwords::{hash_password, verify_password};
use crate::validation::{normalize_email, validate_request};

/// Password reset and change
#[derive(Clone)]
pub struct PasswordService {
    resources: Arc<ServerResources>,
}

impl PasswordService {
    /// Service over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Email a reset link if the address belongs to an active account
    ///
    /// The response is identical whether or not the account exists.
    ///
    /// # Errors
    ///
    /// Returns a validation error or `RATE_LIMIT_EXCEEDED` (per email)
    pub async fn request_reset(
        &self,
        request: ForgotPasswordRequest,
    ) -> AppResult<Throttled<MessageResponse>> {
        validate_request(&request)?;
        let email = normalize_email(&request.email);
        let decision = self
            .resources
            .rate_limiter
            .enforce(RateLimitAction::PasswordResetRequest, &email)
            .await?;

        let database = &self.resources.database;
        match database.get_user_by_email(&email).await? {
            Some(user) if !user.is_deleted => {
                let token =
                    issue_token(database, user.id, TokenPurpose::PasswordReset, None).await?;
                let url = self
                    .resources
                    .email
                    .link(routes::RESET_PASSWORD_PAGE, &token);
                self.resources
                    .email
                    .send_or_log(&user.email, &EmailTemplate::PasswordReset { url })
                    .await;
                AppLogger::log_auth_event(Some(user.id), "password_reset_requested", true, None);
            }
            _ => {
                AppLogger::log_auth_event(
                    None,
                    "password_reset_requested",
                    false,
                    Some("no active account"),
                );
            }
        }

        Ok(Throttled::new(
            MessageResponse::new(messages::PASSWORD_RESET_REQUESTED),
            decision,
        ))
    }

    /// Set a new password using an emailed reset token
    ///
    /// Every session of the account is revoked.
    ///
    /// # Errors
    ///
    /// Returns a validation error, `RATE_LIMIT_EXCEEDED` (per IP),
    /// `TOKEN_INVALID`, `TOKEN_EXPIRED`, or `ACCOUNT_DELETED`
    pub async fn reset_password(
        &self,
        request: ResetPasswordRequest,
        client: &ClientContext,
    ) -> AppResult<Throttled<MessageResponse>> {
        validate_request(&request)?;
        let decision = self
            .resources
            .rate_limiter
            .enforce(RateLimitAction::PasswordReset, &client.ip)
            .await?;

        let database = &self.resources.database;
        let record = consume_token(database, &request.token, TokenPurpose::PasswordReset).await?;
        let user = database
            .get_user(record.user_id)
            .await?
            .ok_or_else(AppError::token_invalid)?;
        match user.account_state(self.resources.grace_period(), Utc::now()) {
            AccountState::Active => {}
            AccountState::PendingDeletion {
                restore_deadline, ..
            } => return Err(AppError::account_deleted(restore_deadline)),
            AccountState::Anonymized => return Err(AppError::account_anonymized()),
        }

        let password_hash = hash_password(&request.password, self.resources.bcrypt_cost()).await?;
        database.update_password(user.id, &password_hash).await?;
        database.delete_user_sessions(user.id, None).await?;
        database
            .delete_user_verification_tokens(user.id, Some(TokenPurpose::PasswordReset))
            .await?;

        self.after_password_change(
            &user,
            "Your password was reset and all devices were signed out.",
        )
        .await;
        AppLogger::log_auth_event(Some(user.id), "password_reset", true, None);

        Ok(Throttled::new(
            MessageResponse::new("Password updated. You can now sign in with your new password."),
            decision,
        ))
    }

    /// Change the caller's password after checking the current one
    ///
    /// Other sessions are revoked; the caller's session stays valid.
    ///
    /// # Errors
    ///
    /// Returns a validation error (wrong current password, unchanged
    /// password), `RATE_LIMIT_EXCEEDED` (per user) or `PERMISSION_DENIED`
    pub async fn change_password(
        &self,
        caller: &AuthenticatedUser,
        request: ChangePasswordRequest,
    ) -> AppResult<Throttled<MessageResponse>> {
        validate_request(&request)?;
        let user = &caller.user;
        let decision = self
            .resources
            .rate_limiter
            .enforce(RateLimitAction::ChangePassword, &user.id.to_string())
            .await?;
        define_abilities_for(Some(user)).ensure_field(Actions::UPDATE, user, "password")?;

        let cost = self.resources.bcrypt_cost();
        if user.password_hash.is_none() {
            return Err(AppError::invalid_input(
                "This account has no password. Use password reset to set one.",
            ));
        }
        let current_hash = user.password_hash.as_deref();
        if !verify_password(&request.current_password, current_hash, cost).await? {
            return Err(AppError::validation(FieldErrors::new())
                .with_field_error("currentPassword", "Current password is incorrect"));
        }
        if request.current_password == request.new_password {
            return Err(AppError::validation(FieldErrors::new()).with_field_error(
                "newPassword",
                "New password must be different from the current password",
            ));
        }

        let database = &self.resources.database;
        let password_hash = hash_password(&request.new_password, cost).await?;
        database.update_password(user.id, &password_hash).await?;
        database
            .delete_user_sessions(user.id, Some(caller.session.id))
            .await?;

        self.after_password_change(
            user,
            "Your password was changed and other devices were signed out.",
        )
        .await;
        AppLogger::log_auth_event(Some(user.id), "password_changed", true, None);

        Ok(Throttled::new(MessageResponse::new("Password changed"), decision))
    }

    async fn after_password_change(&self, user: &User, body: &str) {
        notify(
            &self.resources.database,
            user.id,
            NotificationKind::PasswordChanged,
            "Password changed",
            body,
        )
        .await;
        self.resources
            .email
            .send_or_log(&user.email, &EmailTemplate::PasswordChanged)
            .await;
    }
}
