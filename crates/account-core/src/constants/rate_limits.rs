// ABOUTME: Default rate limit policies for credential and verification actions
// ABOUTME: Each throttled action has a request budget per fixed window
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Login attempts per IP + email
pub const LOGIN_LIMIT: u32 = 5;
/// Login window (15 minutes)
pub const LOGIN_WINDOW_SECS: u64 = 15 * 60;

/// Registrations per IP
pub const REGISTER_LIMIT: u32 = 5;
/// Registration window (1 hour)
pub const REGISTER_WINDOW_SECS: u64 = 60 * 60;

/// Password reset emails per address
pub const PASSWORD_RESET_REQUEST_LIMIT: u32 = 3;
/// Password reset email window (1 hour)
pub const PASSWORD_RESET_REQUEST_WINDOW_SECS: u64 = 60 * 60;

/// Password reset submissions per IP
pub const PASSWORD_RESET_LIMIT: u32 = 5;
/// Password reset submission window (15 minutes)
pub const PASSWORD_RESET_WINDOW_SECS: u64 = 15 * 60;

/// Password changes per user
pub const CHANGE_PASSWORD_LIMIT: u32 = 5;
/// Password change window (15 minutes)
pub const CHANGE_PASSWORD_WINDOW_SECS: u64 = 15 * 60;

/// Email change requests per user
pub const EMAIL_CHANGE_LIMIT: u32 = 3;
/// Email change window (1 hour)
pub const EMAIL_CHANGE_WINDOW_SECS: u64 = 60 * 60;

/// Verification email resends per user
pub const RESEND_VERIFICATION_LIMIT: u32 = 3;
/// Verification resend window (1 hour)
pub const RESEND_VERIFICATION_WINDOW_SECS: u64 = 60 * 60;

/// Deletion requests per user
pub const DELETE_ACCOUNT_LIMIT: u32 = 3;
/// Deletion window (1 hour)
pub const DELETE_ACCOUNT_WINDOW_SECS: u64 = 60 * 60;

/// Restore attempts per IP + email
pub const RESTORE_ACCOUNT_LIMIT: u32 = 5;
/// Restore window (15 minutes)
pub const RESTORE_ACCOUNT_WINDOW_SECS: u64 = 15 * 60;

/// Prefix for every rate limit key in the shared store
pub const KEY_PREFIX: &str = "ratelimit";
