// ABOUTME: One-time verification tokens for password reset, email change and email verification
// ABOUTME: Only the SHA-256 digest of the emailed value is stored
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::tokens;
use crate::errors::AppError;

/// What a verification token authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Set a new password without knowing the current one
    PasswordReset,
    /// Move the account to `new_email`
    EmailChange,
    /// Confirm ownership of the registered address
    EmailVerification,
}

impl TokenPurpose {
    /// Database representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PasswordReset => "password_reset",
            Self::EmailChange => "email_change",
            Self::EmailVerification => "email_verification",
        }
    }

    /// How long a token of this purpose stays valid
    #[must_use]
    pub fn ttl(&self) -> Duration {
        match self {
            Self::PasswordReset => Duration::minutes(tokens::PASSWORD_RESET_TTL_MINUTES),
            Self::EmailChange => Duration::minutes(tokens::EMAIL_CHANGE_TTL_MINUTES),
            Self::EmailVerification => Duration::minutes(tokens::EMAIL_VERIFICATION_TTL_MINUTES),
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenPurpose {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password_reset" => Ok(Self::PasswordReset),
            "email_change" => Ok(Self::EmailChange),
            "email_verification" => Ok(Self::EmailVerification),
            other => Err(AppError::internal(format!("Unknown token purpose: {other}"))),
        }
    }
}

/// Stored verification token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken {
    /// Row identifier
    pub id: Uuid,
    /// User the token was issued for
    pub user_id: Uuid,
    /// What the token authorizes
    pub purpose: TokenPurpose,
    /// Hex SHA-256 of the emailed token
    pub token_hash: String,
    /// Target address for email changes
    pub new_email: Option<String>,
    /// Expiry
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Create a token that expires after the purpose's lifetime
    #[must_use]
    pub fn new(
        user_id: Uuid,
        purpose: TokenPurpose,
        token_hash: String,
        new_email: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            purpose,
            token_hash,
            new_email,
            expires_at: now + purpose.ttl(),
            created_at: now,
        }
    }

    /// Whether the token is past its expiry at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_lifetimes() {
        assert_eq!(TokenPurpose::PasswordReset.ttl(), Duration::hours(1));
        assert_eq!(TokenPurpose::EmailChange.ttl(), Duration::hours(24));
        assert_eq!(TokenPurpose::EmailVerification.ttl(), Duration::hours(24));
    }

    #[test]
    fn test_purpose_parse() {
        for purpose in [
            TokenPurpose::PasswordReset,
            TokenPurpose::EmailChange,
            TokenPurpose::EmailVerification,
        ] {
            assert_eq!(purpose.as_str().parse::<TokenPurpose>().unwrap(), purpose);
        }
    }

    #[test]
    fn test_expiry() {
        let token = VerificationToken::new(
            Uuid::new_v4(),
            TokenPurpose::PasswordReset,
            "h".into(),
            None,
        );
        assert!(!token.is_expired(Utc::now()));
        assert!(token.is_expired(Utc::now() + Duration::hours(2)));
    }
}
