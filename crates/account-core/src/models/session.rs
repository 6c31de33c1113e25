// ABOUTME: Server-side session record referenced by the signed session token
// ABOUTME: Deleting the row revokes the session even if the token has not expired
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Active sign-in of a user on one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Session identifier, embedded in the token as `sid`
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Hard expiry
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Client IP at sign-in
    pub ip_address: Option<String>,
    /// Client user agent at sign-in
    pub user_agent: Option<String>,
}

impl Session {
    /// Create a session valid for `lifetime`
    #[must_use]
    pub fn new(
        user_id: Uuid,
        lifetime: Duration,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            expires_at: now + lifetime,
            created_at: now,
            ip_address,
            user_agent,
        }
    }

    /// Whether the session is past its expiry at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session as listed to its owner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Session identifier
    pub id: Uuid,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Expiry
    pub expires_at: DateTime<Utc>,
    /// Client IP at sign-in
    pub ip_address: Option<String>,
    /// Client user agent at sign-in
    pub user_agent: Option<String>,
    /// Whether this is the session making the request
    pub current: bool,
}

impl SessionView {
    /// Build the view, marking the caller's own session
    #[must_use]
    pub fn from_session(session: &Session, current_session_id: Uuid) -> Self {
        Self {
            id: session.id,
            created_at: session.created_at,
            expires_at: session.expires_at,
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            current: session.id == current_session_id,
        }
    }
}
