// ABOUTME: Profile management, soft deletion with a grace period, and restore
// ABOUTME: Also lists and revokes sessions and linked sign-in methods of the caller
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use account_core::constants::{messages, routes};
use account_core::errors::{AppError, AppResult, FieldErrors};
use account_core::models::{AccountState, LinkedAccount, NotificationKind, PublicUser, SessionView};
use account_core::permissions::{define_abilities_for, Actions};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use super::notify;
use super::types::{
    AuthenticatedUser, ClientContext, DeleteAccountRequest, DeletionScheduledResponse,
    MessageResponse, RestoreAccountRequest, RestoreResponse, UpdateProfileRequest,
};
use crate::database_plugins::DatabaseProvider;
use crate::email::EmailTemplate;
use crate::logging::AppLogger;
use crate::middleware::rate_limiting::Throttled;
use crate::rate_limiting::{ip_and_email, RateLimitAction};
use crate::resources::ServerResources;
use crate::security::passwords::verify_password;
use crate::validation::{normalize_email, validate_request};

/// Account self-service
#[derive(Clone)]
pub struct AccountService {
    resources: Arc<ServerResources>,
}

impl AccountService {
    /// Service over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Profile of the caller
    ///
    /// # Errors
    ///
    /// Returns `PERMISSION_DENIED` if the caller may not read their account
    pub fn get_profile(caller: &AuthenticatedUser) -> AppResult<PublicUser> {
        define_abilities_for(Some(&caller.user)).ensure(Actions::READ, &caller.user)?;
        Ok(PublicUser::from(&caller.user))
    }

    /// Change name, username or avatar
    ///
    /// Absent fields are left unchanged; an empty name or image clears it.
    ///
    /// # Errors
    ///
    /// Returns a validation error, `PERMISSION_DENIED` for fields the caller
    /// may not edit, or `RESOURCE_ALREADY_EXISTS` for a taken username
    pub async fn update_profile(
        &self,
        caller: &AuthenticatedUser,
        mut request: UpdateProfileRequest,
    ) -> AppResult<PublicUser> {
        // An empty string clears an optional field rather than failing validation
        let clear_name = request.name.as_deref().is_some_and(str::is_empty);
        let clear_image = request.image.as_deref().is_some_and(str::is_empty);
        if clear_name {
            request.name = None;
        }
        if clear_image {
            request.image = None;
        }
        validate_request(&request)?;

        let ability = define_abilities_for(Some(&caller.user));
        let mut user = caller.user.clone();
        let database = &self.resources.database;

        if request.name.is_some() || clear_name {
            ability.ensure_field(Actions::UPDATE, &user, "name")?;
            user.name = request.name.map(|n| n.trim().to_owned());
        }
        if request.image.is_some() || clear_image {
            ability.ensure_field(Actions::UPDATE, &user, "image")?;
            user.image = request.image;
        }
        if let Some(username) = request.username {
            ability.ensure_field(Actions::UPDATE, &user, "username")?;
            let username = username.trim().to_owned();
            if let Some(existing) = database.get_user_by_username(&username).await? {
                if existing.id != user.id {
                    return Err(AppError::already_exists("This username is already taken")
                        .with_field_error("username", "Username is already taken"));
                }
            }
            user.username = Some(username);
        }

        user.updated_at = Utc::now();
        database.update_user_profile(&user).await?;
        Ok(PublicUser::from(&user))
    }

    /// Soft delete the caller's account and sign out every device
    ///
    /// The account can be restored until the grace period ends, after which
    /// the cleanup job anonymizes it.
    ///
    /// # Errors
    ///
    /// Returns a validation error (missing `DELETE` confirmation, wrong
    /// password), `RATE_LIMIT_EXCEEDED` (per user) or `PERMISSION_DENIED`
    pub async fn delete_account(
        &self,
        caller: &AuthenticatedUser,
        request: DeleteAccountRequest,
    ) -> AppResult<Throttled<DeletionScheduledResponse>> {
        validate_request(&request)?;
        let user = &caller.user;
        let decision = self
            .resources
            .rate_limiter
            .enforce(RateLimitAction::DeleteAccount, &user.id.to_string())
            .await?;
        define_abilities_for(Some(user)).ensure(Actions::DELETE, user)?;

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

        let database = &self.resources.database;
        let now = Utc::now();
        if !database.soft_delete_user(user.id, now).await? {
            return Err(AppError::invalid_input("Account is already scheduled for deletion"));
        }
        // The deletion is committed; a session that survives this still fails authentication
        if let Err(e) = database.delete_user_sessions(user.id, None).await {
            warn!(user.id = %user.id, "Failed to revoke sessions after deletion: {}", e.message);
        }

        let restore_deadline = now + self.resources.grace_period();
        notify(
            database,
            user.id,
            NotificationKind::AccountDeletionScheduled,
            "Account scheduled for deletion",
            &format!(
                "Your account will be permanently deleted after {}.",
                restore_deadline.format("%Y-%m-%d")
            ),
        )
        .await;
        let restore_url = self.resources.email.page(routes::RESTORE_ACCOUNT_PAGE);
        self.resources
            .email
            .send_or_log(
                &user.email,
                &EmailTemplate::DeletionScheduled {
                    restore_deadline,
                    restore_url,
                },
            )
            .await;
        AppLogger::log_lifecycle_event(
            user.id,
            "deletion_scheduled",
            Some(&format!("restore_deadline={}", restore_deadline.to_rfc3339())),
        );

        Ok(Throttled::new(
            DeletionScheduledResponse {
                message: format!(
                    "Your account will be deleted. You can restore it until {}.",
                    restore_deadline.format("%Y-%m-%d")
                ),
                restore_deadline,
            },
            decision,
        ))
    }

    /// Bring a soft-deleted account back using its credentials
    ///
    /// # Errors
    ///
    /// Returns `AUTH_INVALID` for bad credentials, `RATE_LIMIT_EXCEEDED`
    /// (per IP and email), `INVALID_INPUT` for an active account, or
    /// `ACCOUNT_ANONYMIZED` once the grace period has passed
    pub async fn restore_account(
        &self,
        request: RestoreAccountRequest,
        client: &ClientContext,
    ) -> AppResult<Throttled<RestoreResponse>> {
        validate_request(&request)?;
        let email = normalize_email(&request.email);
        let decision = self
            .resources
            .rate_limiter
            .enforce(
                RateLimitAction::RestoreAccount,
                &ip_and_email(&client.ip, &email),
            )
            .await?;

        let database = &self.resources.database;
        let user = database.get_user_by_email(&email).await?;
        let stored_hash = user.as_ref().and_then(|u| u.password_hash.as_deref());
        let valid =
            verify_password(&request.password, stored_hash, self.resources.bcrypt_cost()).await?;
        let Some(mut user) = user.filter(|_| valid) else {
            return Err(AppError::auth_invalid(messages::INVALID_CREDENTIALS));
        };

        match user.account_state(self.resources.grace_period(), Utc::now()) {
            AccountState::Active => {
                return Err(AppError::invalid_input("Account is not scheduled for deletion"));
            }
            AccountState::Anonymized => return Err(AppError::account_anonymized()),
            AccountState::PendingDeletion { .. } => {}
        }

        if !database.restore_user(user.id).await? {
            return Err(AppError::invalid_input("Account is not scheduled for deletion"));
        }
        user.is_deleted = false;
        user.deleted_at = None;

        notify(
            database,
            user.id,
            NotificationKind::AccountRestored,
            "Account restored",
            "Your account is no longer scheduled for deletion.",
        )
        .await;
        self.resources
            .email
            .send_or_log(&user.email, &EmailTemplate::AccountRestored)
            .await;
        AppLogger::log_lifecycle_event(user.id, "restored", None);

        Ok(Throttled::new(
            RestoreResponse {
                user: PublicUser::from(&user),
                message: "Your account has been restored. You can sign in again.".to_owned(),
            },
            decision,
        ))
    }

    /// Live sessions of the caller, newest first, with the current one marked
    ///
    /// # Errors
    ///
    /// Returns a database error if the sessions cannot be read
    pub async fn list_sessions(&self, caller: &AuthenticatedUser) -> AppResult<Vec<SessionView>> {
        let sessions = self
            .resources
            .database
            .list_user_sessions(caller.user.id, Utc::now())
            .await?;
        let ability = define_abilities_for(Some(&caller.user));
        Ok(sessions
            .iter()
            .filter(|s| ability.can(Actions::READ, *s))
            .map(|s| SessionView::from_session(s, caller.session.id))
            .collect())
    }

    /// Sign out one session
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` for unknown sessions or `PERMISSION_DENIED`
    /// for sessions of other accounts
    pub async fn revoke_session(
        &self,
        caller: &AuthenticatedUser,
        session_id: Uuid,
    ) -> AppResult<MessageResponse> {
        let database = &self.resources.database;
        let session = database
            .get_session(session_id)
            .await?
            .ok_or_else(|| AppError::not_found("Session"))?;
        define_abilities_for(Some(&caller.user)).ensure(Actions::DELETE, &session)?;

        database.delete_session(session.id).await?;
        AppLogger::log_auth_event(Some(caller.user.id), "session_revoked", true, None);
        Ok(MessageResponse::new("Session revoked"))
    }

    /// Provider accounts linked to the caller
    ///
    /// # Errors
    ///
    /// Returns a database error if the accounts cannot be read
    pub async fn list_linked_accounts(
        &self,
        caller: &AuthenticatedUser,
    ) -> AppResult<Vec<LinkedAccount>> {
        self.resources
            .database
            .list_linked_accounts(caller.user.id)
            .await
    }

    /// Remove a linked provider account
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND`, `PERMISSION_DENIED`, or `INVALID_INPUT`
    /// when it is the owner's last way to sign in
    pub async fn unlink_account(
        &self,
        caller: &AuthenticatedUser,
        account_id: Uuid,
    ) -> AppResult<MessageResponse> {
        let database = &self.resources.database;
        let account = database
            .get_linked_account(account_id)
            .await?
            .ok_or_else(|| AppError::not_found("Linked account"))?;
        define_abilities_for(Some(&caller.user)).ensure(Actions::DELETE, &account)?;

        let owner = database
            .get_user(account.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        let linked = database.list_linked_accounts(owner.id).await?;
        if !owner.has_password() && linked.len() <= 1 {
            return Err(AppError::invalid_input(
                "Cannot remove the last sign-in method. Set a password first.",
            ));
        }

        database.delete_linked_account(account.id).await?;
        AppLogger::log_auth_event(
            Some(owner.id),
            "account_unlinked",
            true,
            Some(&account.provider),
        );
        Ok(MessageResponse::new(format!("Disconnected {}", account.provider)))
    }
}
