// ABOUTME: Two-step email address change confirmed from the new mailbox
// ABOUTME: The pending address travels in the verification token row until confirmed
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use account_core::constants::routes;
use account_core::errors::{AppError, AppResult, FieldErrors};
use account_core::models::{AccountState, NotificationKind, PublicUser, TokenPurpose};
use account_core::permissions::{define_abilities_for, Actions};
use chrono::Utc;

use super::types::{AuthenticatedUser, EmailChangeRequest, MessageResponse, TokenRequest};
use super::{consume_token, issue_token, notify};
use crate::database_plugins::DatabaseProvider;
use crate::email::EmailTemplate;
use crate::logging::AppLogger;
use crate::middleware::rate_limiting::Throttled;
use crate::rate_limiting::RateLimitAction;
use crate::resources::ServerResources;
use crate::security::passwords::verify_password;
use crate::validation::{normalize_email, validate_request};

/// Email address change
#[derive(Clone)]
pub struct EmailChangeService {
    resources: Arc<ServerResources>,
}

impl EmailChangeService {
    /// Service over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Send a confirmation link to the new address and a notice to the current one
    ///
    /// # Errors
    ///
    /// Returns a validation error (wrong password, unchanged or taken
    /// address), `RATE_LIMIT_EXCEEDED` (per user) or `PERMISSION_DENIED`
    pub async fn request_change(
        &self,
        caller: &AuthenticatedUser,
        request: EmailChangeRequest,
    ) -> AppResult<Throttled<MessageResponse>> {
        validate_request(&request)?;
        let user = &caller.user;
        let decision = self
            .resources
            .rate_limiter
            .enforce(RateLimitAction::EmailChange, &user.id.to_string())
            .await?;
        define_abilities_for(Some(user)).ensure_field(Actions::UPDATE, user, "email")?;

        if user.has_password() {
            let password = request.password.as_deref().unwrap_or_default();
            let valid = verify_password(
                password,
                user.password_hash.as_deref(),
                self.resources.bcrypt_cost(),
            )
            .await?;
            if !valid {
                return Err(AppError::validation(FieldErrors::new())
                    .with_field_error("password", "Password is incorrect"));
            }
        }

        let new_email = normalize_email(&request.new_email);
        if new_email == user.email {
            return Err(AppError::validation(FieldErrors::new()).with_field_error(
                "newEmail",
                "New email must be different from the current one",
            ));
        }
        let database = &self.resources.database;
        if database.get_user_by_email(&new_email).await?.is_some() {
            return Err(AppError::validation(FieldErrors::new())
                .with_field_error("newEmail", "Email is already in use"));
        }

        let token = issue_token(
            database,
            user.id,
            TokenPurpose::EmailChange,
            Some(new_email.clone()),
        )
        .await?;
        let url = self
            .resources
            .email
            .link(routes::CONFIRM_EMAIL_CHANGE_PAGE, &token);
        self.resources
            .email
            .send_or_log(
                &new_email,
                &EmailTemplate::EmailChangeConfirm {
                    url,
                    new_email: new_email.clone(),
                },
            )
            .await;
        self.resources
            .email
            .send_or_log(
                &user.email,
                &EmailTemplate::EmailChangeNotice {
                    new_email: new_email.clone(),
                },
            )
            .await;
        AppLogger::log_auth_event(Some(user.id), "email_change_requested", true, None);

        Ok(Throttled::new(
            MessageResponse::new(format!("Check {new_email} for a link to confirm the change.")),
            decision,
        ))
    }

    /// Move the account to the address carried by an email change token
    ///
    /// # Errors
    ///
    /// Returns `TOKEN_INVALID`, `TOKEN_EXPIRED`, `ACCOUNT_DELETED` or
    /// `RESOURCE_ALREADY_EXISTS` when the address was taken meanwhile
    pub async fn confirm_change(&self, request: TokenRequest) -> AppResult<PublicUser> {
        validate_request(&request)?;
        let database = &self.resources.database;
        let record = consume_token(database, &request.token, TokenPurpose::EmailChange).await?;
        let new_email = record.new_email.ok_or_else(AppError::token_invalid)?;

        let mut user = database
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

        if let Some(existing) = database.get_user_by_email(&new_email).await? {
            if existing.id != user.id {
                return Err(AppError::already_exists("Email is already in use"));
            }
        }

        let now = Utc::now();
        database.update_email(user.id, &new_email, Some(now)).await?;
        let old_email = std::mem::replace(&mut user.email, new_email);
        user.email_verified_at = Some(now);

        notify(
            database,
            user.id,
            NotificationKind::EmailChanged,
            "Email address changed",
            &format!("Your sign-in address is now {}.", user.email),
        )
        .await;
        AppLogger::log_lifecycle_event(
            user.id,
            "email_changed",
            Some(&format!("from {}", crate::logging::mask_email(&old_email))),
        );

        Ok(PublicUser::from(&user))
    }
}
