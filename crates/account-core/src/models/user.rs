// ABOUTME: User account model with role and soft-delete lifecycle state
// ABOUTME: Derives Active / PendingDeletion / Anonymized from deletion timestamps
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Role of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular account
    #[default]
    User,
    /// Operator with access to the admin surface
    Admin,
}

impl UserRole {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(AppError::invalid_input(format!("Unknown role: {other}"))),
        }
    }
}

/// Where an account is in its deletion lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// Normal account
    Active,
    /// Soft deleted, restorable until `restore_deadline`
    PendingDeletion {
        /// When the user asked for deletion
        deleted_at: DateTime<Utc>,
        /// Last instant the account can be restored
        restore_deadline: DateTime<Utc>,
    },
    /// Soft deleted and past the grace period; personal data removed or about to be
    Anonymized,
}

/// User account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: Option<String>,
    /// Unique handle
    pub username: Option<String>,
    /// Unique, lower-cased email address
    pub email: String,
    /// When the email address was confirmed
    pub email_verified_at: Option<DateTime<Utc>>,
    /// Avatar URL
    pub image: Option<String>,
    /// bcrypt hash; `None` for accounts that only sign in through a linked provider
    pub password_hash: Option<String>,
    /// Account role
    pub role: UserRole,
    /// Soft-delete flag
    pub is_deleted: bool,
    /// When the account was soft deleted
    pub deleted_at: Option<DateTime<Utc>>,
    /// When personal data was removed
    pub anonymized_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user
    #[must_use]
    pub fn new(email: String, password_hash: Option<String>, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            username: None,
            email,
            email_verified_at: None,
            image: None,
            password_hash,
            role: UserRole::User,
            is_deleted: false,
            deleted_at: None,
            anonymized_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the user has the admin role
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Whether the account can sign in with a password
    #[must_use]
    pub const fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Whether the email address has been confirmed
    #[must_use]
    pub const fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Lifecycle state at `now` for the given grace period
    #[must_use]
    pub fn account_state(&self, grace_period: Duration, now: DateTime<Utc>) -> AccountState {
        if self.anonymized_at.is_some() {
            return AccountState::Anonymized;
        }
        if !self.is_deleted {
            return AccountState::Active;
        }
        // A deleted row without a timestamp is treated as deleted right now so it
        // still gets a full grace period instead of being anonymized immediately.
        let deleted_at = self.deleted_at.unwrap_or(now);
        let restore_deadline = deleted_at + grace_period;
        if now > restore_deadline {
            AccountState::Anonymized
        } else {
            AccountState::PendingDeletion {
                deleted_at,
                restore_deadline,
            }
        }
    }
}

/// Serializable view of a user without credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: Option<String>,
    /// Unique handle
    pub username: Option<String>,
    /// Email address
    pub email: String,
    /// Whether the email address is confirmed
    pub email_verified: bool,
    /// Avatar URL
    pub image: Option<String>,
    /// Account role
    pub role: UserRole,
    /// Whether a password is set
    pub has_password: bool,
    /// Soft-delete flag
    pub is_deleted: bool,
    /// When the account was soft deleted
    pub deleted_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            email_verified: user.is_email_verified(),
            image: user.image.clone(),
            role: user.role,
            has_password: user.has_password(),
            is_deleted: user.is_deleted,
            deleted_at: user.deleted_at,
            created_at: user.created_at,
        }
    }
}
