// ABOUTME: External sign-in method (OAuth provider account) linked to a user
// ABOUTME: Mirrors the provider/providerAccountId pair issued by the identity provider
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider account linked to a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    /// Identifier
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Provider name (`github`, `google`, ...)
    pub provider: String,
    /// Subject identifier at the provider
    pub provider_account_id: String,
    /// Account kind (`oauth`, `oidc`, `email`)
    pub account_type: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl LinkedAccount {
    /// Link a provider account to `user_id`
    #[must_use]
    pub fn new(
        user_id: Uuid,
        provider: impl Into<String>,
        provider_account_id: impl Into<String>,
        account_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider: provider.into(),
            provider_account_id: provider_account_id.into(),
            account_type: account_type.into(),
            created_at: Utc::now(),
        }
    }
}
