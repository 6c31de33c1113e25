// ABOUTME: User administration for accounts with the admin role
// ABOUTME: Listing, role changes and restoring soft-deleted accounts on a user's behalf
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use account_core::errors::{AppError, AppResult};
use account_core::models::{AccountState, NotificationKind, PublicUser, User, UserRole};
use account_core::permissions::{define_abilities_for, Actions, SubjectType};
use chrono::Utc;
use uuid::Uuid;

use super::notify;
use super::types::{
    page_size, AuthenticatedUser, CreateAdminRequest, ListUsersQuery, UserListResponse,
};
use crate::database_plugins::{DatabaseProvider, UserListFilter};
use crate::logging::AppLogger;
use crate::resources::ServerResources;
use crate::security::passwords::hash_password;
use crate::validation::{normalize_email, validate_request};

/// Administration of every account
#[derive(Clone)]
pub struct AdminService {
    resources: Arc<ServerResources>,
}

impl AdminService {
    /// Service over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    fn require_admin(caller: &AuthenticatedUser) -> AppResult<()> {
        define_abilities_for(Some(&caller.user))
            .ensure_type(Actions::MANAGE, SubjectType::All)
            .map_err(|_| AppError::permission_denied("Administrator access required"))
    }

    /// Page of users, optionally including soft-deleted ones
    ///
    /// # Errors
    ///
    /// Returns `PERMISSION_DENIED` for non-admins or a database error
    pub async fn list_users(
        &self,
        caller: &AuthenticatedUser,
        query: ListUsersQuery,
    ) -> AppResult<UserListResponse> {
        Self::require_admin(caller)?;
        let filter = UserListFilter {
            include_deleted: query.include_deleted,
            search: query
                .search
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            limit: page_size(query.limit),
            offset: query.offset.unwrap_or(0),
        };

        let database = &self.resources.database;
        let users = database.list_users(&filter).await?;
        let total = database.count_users(&filter).await?;
        Ok(UserListResponse {
            users: users.iter().map(PublicUser::from).collect(),
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    /// One user by ID
    ///
    /// # Errors
    ///
    /// Returns `PERMISSION_DENIED` or `RESOURCE_NOT_FOUND`
    pub async fn get_user(
        &self,
        caller: &AuthenticatedUser,
        user_id: Uuid,
    ) -> AppResult<PublicUser> {
        Self::require_admin(caller)?;
        let user = self.load(user_id).await?;
        define_abilities_for(Some(&caller.user)).ensure(Actions::READ, &user)?;
        Ok(PublicUser::from(&user))
    }

    /// Grant or revoke the admin role
    ///
    /// # Errors
    ///
    /// Returns `PERMISSION_DENIED` (including for an admin's own role) or
    /// `RESOURCE_NOT_FOUND`
    pub async fn set_role(
        &self,
        caller: &AuthenticatedUser,
        user_id: Uuid,
        role: UserRole,
    ) -> AppResult<PublicUser> {
        Self::require_admin(caller)?;
        let mut user = self.load(user_id).await?;
        define_abilities_for(Some(&caller.user)).ensure_field(Actions::UPDATE, &user, "role")?;

        if user.role != role {
            self.resources
                .database
                .update_user_role(user.id, role)
                .await?;
            notify(
                &self.resources.database,
                user.id,
                NotificationKind::Security,
                "Role changed",
                &format!("Your account role is now {role}."),
            )
            .await;
            AppLogger::log_security_event(
                "role_changed",
                "info",
                &format!("role={role} by={}", caller.user.id),
                Some(user.id),
            );
            user.role = role;
        }
        Ok(PublicUser::from(&user))
    }

    /// Restore a soft-deleted user that is still within the grace period
    ///
    /// # Errors
    ///
    /// Returns `PERMISSION_DENIED`, `RESOURCE_NOT_FOUND`, `INVALID_INPUT` for
    /// active accounts, or `ACCOUNT_ANONYMIZED`
    pub async fn restore_user(
        &self,
        caller: &AuthenticatedUser,
        user_id: Uuid,
    ) -> AppResult<PublicUser> {
        Self::require_admin(caller)?;
        let mut user = self.load(user_id).await?;
        define_abilities_for(Some(&caller.user)).ensure(Actions::UPDATE, &user)?;

        match user.account_state(self.resources.grace_period(), Utc::now()) {
            AccountState::Active => {
                return Err(AppError::invalid_input("Account is not scheduled for deletion"));
            }
            AccountState::Anonymized => return Err(AppError::account_anonymized()),
            AccountState::PendingDeletion { .. } => {}
        }

        if !self.resources.database.restore_user(user.id).await? {
            // Anonymized or restored since the state check above
            let current = self.load(user.id).await?;
            return Err(if current.anonymized_at.is_some() {
                AppError::account_anonymized()
            } else {
                AppError::invalid_input("Account is not scheduled for deletion")
            });
        }
        user.is_deleted = false;
        user.deleted_at = None;
        notify(
            &self.resources.database,
            user.id,
            NotificationKind::AccountRestored,
            "Account restored",
            "An administrator restored your account.",
        )
        .await;
        AppLogger::log_lifecycle_event(
            user.id,
            "restored_by_admin",
            Some(&format!("admin={}", caller.user.id)),
        );
        Ok(PublicUser::from(&user))
    }

    /// Give the account registered under `email` the admin role (CLI, no caller)
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` when no active account uses the address
    pub async fn promote(&self, email: &str) -> AppResult<PublicUser> {
        let database = &self.resources.database;
        let mut user = database
            .get_user_by_email(&normalize_email(email))
            .await?
            .filter(|u| !u.is_deleted)
            .ok_or_else(|| AppError::not_found("Active user"))?;
        if user.role != UserRole::Admin {
            database.update_user_role(user.id, UserRole::Admin).await?;
            user.role = UserRole::Admin;
        }
        AppLogger::log_security_event("admin_promoted", "info", "promoted from CLI", Some(user.id));
        Ok(PublicUser::from(&user))
    }

    /// Create a verified admin account with a password (CLI, no caller)
    ///
    /// # Errors
    ///
    /// Returns a validation error for a weak password or invalid email and
    /// `RESOURCE_ALREADY_EXISTS` when the address is taken
    pub async fn create_admin(&self, email: &str, password: &str) -> AppResult<PublicUser> {
        let request = CreateAdminRequest {
            email: normalize_email(email),
            password: password.to_owned(),
        };
        validate_request(&request)?;
        let email = request.email;

        let database = &self.resources.database;
        if database.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::already_exists("An account with this email already exists"));
        }
        let password_hash = hash_password(password, self.resources.bcrypt_cost()).await?;
        let mut user = User::new(email, Some(password_hash), None);
        user.role = UserRole::Admin;
        user.email_verified_at = Some(Utc::now());
        database.create_user(&user).await?;
        AppLogger::log_security_event("admin_created", "info", "created from CLI", Some(user.id));
        Ok(PublicUser::from(&user))
    }

    async fn load(&self, user_id: Uuid) -> AppResult<User> {
        self.resources
            .database
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }
}
