// ABOUTME: In-app notifications about security-relevant account activity
// ABOUTME: Created by account actions, read and dismissed by their owner
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Category of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Password was changed or reset
    PasswordChanged,
    /// Email address was changed
    EmailChanged,
    /// Account deletion was requested
    AccountDeletionScheduled,
    /// Account was restored from pending deletion
    AccountRestored,
    /// Other security notice (new role, session revoked)
    Security,
}

impl NotificationKind {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PasswordChanged => "password_changed",
            Self::EmailChanged => "email_changed",
            Self::AccountDeletionScheduled => "account_deletion_scheduled",
            Self::AccountRestored => "account_restored",
            Self::Security => "security",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password_changed" => Ok(Self::PasswordChanged),
            "email_changed" => Ok(Self::EmailChanged),
            "account_deletion_scheduled" => Ok(Self::AccountDeletionScheduled),
            "account_restored" => Ok(Self::AccountRestored),
            "security" => Ok(Self::Security),
            other => Err(AppError::internal(format!("Unknown notification kind: {other}"))),
        }
    }
}

/// Notification owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Identifier
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Category
    pub kind: NotificationKind,
    /// Short headline
    pub title: String,
    /// Body text
    pub body: String,
    /// When the owner marked it read
    pub read_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create an unread notification
    #[must_use]
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            read_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the owner has read it
    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}
