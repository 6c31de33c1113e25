// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Lifecycle periods, token lifetimes, input limits and rate limit defaults
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Constants module
//!
//! Constants are grouped into logical domains rather than a single flat list.

/// Rate limit policies for each throttled action
pub mod rate_limits;

/// Account lifecycle (soft delete, grace period, anonymization)
pub mod lifecycle {
    /// Days a soft-deleted account can still be restored
    pub const DELETION_GRACE_PERIOD_DAYS: i64 = 30;
    /// Domain used for the placeholder address of an anonymized account
    ///
    /// `.invalid` is reserved (RFC 2606) so the address can never be delivered.
    pub const ANONYMIZED_EMAIL_DOMAIN: &str = "deleted.invalid";
    /// Text the user must type to confirm account deletion
    pub const DELETE_CONFIRMATION: &str = "DELETE";
}

/// Verification token parameters
pub mod tokens {
    /// Random bytes per token before encoding
    pub const TOKEN_BYTES: usize = 32;
    /// Password reset links are valid for one hour
    pub const PASSWORD_RESET_TTL_MINUTES: i64 = 60;
    /// Email change confirmations are valid for one day
    pub const EMAIL_CHANGE_TTL_MINUTES: i64 = 24 * 60;
    /// Email verification links are valid for one day
    pub const EMAIL_VERIFICATION_TTL_MINUTES: i64 = 24 * 60;
}

/// Session parameters
pub mod sessions {
    /// Cookie carrying the session JWT
    pub const SESSION_COOKIE_NAME: &str = "session_token";
    /// Default session lifetime
    pub const DEFAULT_SESSION_HOURS: i64 = 24 * 30;
    /// JWT issuer claim
    pub const JWT_ISSUER: &str = "account-server";
}

/// Input limits
pub mod limits {
    /// Minimum password length
    pub const PASSWORD_MIN_LENGTH: u64 = 8;
    /// bcrypt ignores everything after 72 bytes
    pub const PASSWORD_MAX_LENGTH: u64 = 72;
    /// Minimum username length
    pub const USERNAME_MIN_LENGTH: u64 = 3;
    /// Maximum username length
    pub const USERNAME_MAX_LENGTH: u64 = 30;
    /// Maximum display name length
    pub const NAME_MAX_LENGTH: u64 = 100;
    /// Maximum email length (RFC 5321 path limit)
    pub const EMAIL_MAX_LENGTH: u64 = 254;
    /// Maximum avatar URL length
    pub const IMAGE_URL_MAX_LENGTH: u64 = 2048;
    /// Default page size for list endpoints
    pub const DEFAULT_PAGE_SIZE: u32 = 50;
    /// Upper bound for page size
    pub const MAX_PAGE_SIZE: u32 = 100;
}

/// Network ports
pub mod ports {
    /// Default HTTP port
    pub const DEFAULT_HTTP_PORT: u16 = 3000;
}

/// User-facing messages that must not vary with account existence
pub mod messages {
    /// Response to a password reset request, identical whether or not the email is registered
    pub const PASSWORD_RESET_REQUESTED: &str =
        "If an account exists for that email, a password reset link has been sent.";
    /// Login failure for unknown email and wrong password alike
    pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
}

/// API routes
pub mod routes {
    /// Cron endpoint that anonymizes accounts past their grace period
    pub const CRON_CLEANUP_DELETED_ACCOUNTS: &str = "/api/cron/cleanup-deleted-accounts";
    /// Path of the password reset page the emailed link points to
    pub const RESET_PASSWORD_PAGE: &str = "/reset-password";
    /// Path of the email verification page
    pub const VERIFY_EMAIL_PAGE: &str = "/verify-email";
    /// Path of the email change confirmation page
    pub const CONFIRM_EMAIL_CHANGE_PAGE: &str = "/settings/email/confirm";
    /// Path of the account restore page
    pub const RESTORE_ACCOUNT_PAGE: &str = "/restore-account";
}
