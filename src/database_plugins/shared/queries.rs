// ABOUTME: SQL data statements shared by the SQLite and PostgreSQL backends
// ABOUTME: Placeholders use $N which both drivers bind positionally
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

// Statement names describe the statements
#![allow(missing_docs)]

/// Columns selected for every `User` read
pub const USER_COLUMNS: &str = "id, name, username, email, email_verified_at, image, \
    password_hash, role, is_deleted, deleted_at, anonymized_at, created_at, updated_at";

pub const INSERT_USER: &str = r"
    INSERT INTO users (
        id, name, username, email, email_verified_at, image, password_hash, role,
        is_deleted, deleted_at, anonymized_at, created_at, updated_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
";

pub const UPDATE_USER_PROFILE: &str =
    "UPDATE users SET name = $2, username = $3, image = $4, updated_at = $5 WHERE id = $1";

pub const UPDATE_PASSWORD: &str =
    "UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1";

pub const UPDATE_EMAIL: &str =
    "UPDATE users SET email = $2, email_verified_at = $3, updated_at = $4 WHERE id = $1";

pub const MARK_EMAIL_VERIFIED: &str =
    "UPDATE users SET email_verified_at = $2, updated_at = $3 WHERE id = $1";

pub const UPDATE_ROLE: &str = "UPDATE users SET role = $2, updated_at = $3 WHERE id = $1";

pub const SOFT_DELETE_USER: &str = r"
    UPDATE users SET is_deleted = TRUE, deleted_at = $2, updated_at = $3
    WHERE id = $1 AND is_deleted = FALSE
";

pub const RESTORE_USER: &str = r"
    UPDATE users SET is_deleted = FALSE, deleted_at = NULL, updated_at = $2
    WHERE id = $1 AND is_deleted = TRUE AND anonymized_at IS NULL
";

pub const USERS_PENDING_ANONYMIZATION: &str = r"
    SELECT id FROM users
    WHERE is_deleted = TRUE
      AND anonymized_at IS NULL
      AND deleted_at IS NOT NULL
      AND deleted_at <= $1
    ORDER BY deleted_at
";

pub const ANONYMIZE_USER: &str = r"
    UPDATE users SET
        email = $2,
        name = NULL,
        username = NULL,
        image = NULL,
        password_hash = NULL,
        email_verified_at = NULL,
        anonymized_at = $3,
        updated_at = $3
    WHERE id = $1 AND is_deleted = TRUE AND anonymized_at IS NULL
";

/// Tables holding rows owned by a user, cleared on anonymization
pub const USER_OWNED_TABLES: [&str; 4] =
    ["sessions", "accounts", "verification_tokens", "notifications"];

pub const INSERT_SESSION: &str = r"
    INSERT INTO sessions (id, user_id, expires_at, created_at, ip_address, user_agent)
    VALUES ($1, $2, $3, $4, $5, $6)
";

pub const SESSION_COLUMNS: &str = "id, user_id, expires_at, created_at, ip_address, user_agent";

pub const DELETE_SESSION: &str = "DELETE FROM sessions WHERE id = $1";

pub const DELETE_USER_SESSIONS: &str =
    "DELETE FROM sessions WHERE user_id = $1 AND ($2 IS NULL OR id <> $2)";

pub const PURGE_EXPIRED_SESSIONS: &str = "DELETE FROM sessions WHERE expires_at <= $1";

pub const TOKEN_COLUMNS: &str =
    "id, user_id, purpose, token_hash, new_email, expires_at, created_at";

pub const INSERT_VERIFICATION_TOKEN: &str = r"
    INSERT INTO verification_tokens (id, user_id, purpose, token_hash, new_email, expires_at, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
";

pub const DELETE_TOKENS_FOR_PURPOSE: &str =
    "DELETE FROM verification_tokens WHERE user_id = $1 AND purpose = $2";

pub const DELETE_USER_TOKENS: &str =
    "DELETE FROM verification_tokens WHERE user_id = $1 AND ($2 IS NULL OR purpose = $2)";

pub const DELETE_TOKEN: &str = "DELETE FROM verification_tokens WHERE id = $1";

pub const PURGE_EXPIRED_TOKENS: &str = "DELETE FROM verification_tokens WHERE expires_at <= $1";

pub const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, body, read_at, created_at";

pub const INSERT_NOTIFICATION: &str = r"
    INSERT INTO notifications (id, user_id, kind, title, body, read_at, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
";

pub const COUNT_UNREAD_NOTIFICATIONS: &str =
    "SELECT COUNT(*) AS count FROM notifications WHERE user_id = $1 AND read_at IS NULL";

pub const MARK_NOTIFICATION_READ: &str =
    "UPDATE notifications SET read_at = $2 WHERE id = $1 AND read_at IS NULL";

pub const MARK_ALL_NOTIFICATIONS_READ: &str =
    "UPDATE notifications SET read_at = $2 WHERE user_id = $1 AND read_at IS NULL";

pub const DELETE_NOTIFICATION: &str = "DELETE FROM notifications WHERE id = $1";

pub const ACCOUNT_COLUMNS: &str =
    "id, user_id, provider, provider_account_id, account_type, created_at";

pub const INSERT_ACCOUNT: &str = r"
    INSERT INTO accounts (id, user_id, provider, provider_account_id, account_type, created_at)
    VALUES ($1, $2, $3, $4, $5, $6)
";

pub const DELETE_ACCOUNT: &str = "DELETE FROM accounts WHERE id = $1";

/// `SELECT` of user columns filtered by one equality column
#[must_use]
pub fn select_user_by(column: &str) -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1")
}

/// Admin filter shared by the listing and its total: `$1` includes deleted
/// rows, `$2` is an optional `LIKE` pattern
const USER_LIST_FILTER: &str = r"
    ($1 OR is_deleted = FALSE)
    AND ($2 IS NULL
         OR LOWER(email) LIKE $2 ESCAPE '\'
         OR LOWER(COALESCE(name, '')) LIKE $2 ESCAPE '\'
         OR LOWER(COALESCE(username, '')) LIKE $2 ESCAPE '\')
";

/// Admin listing, newest first
#[must_use]
pub fn list_users() -> String {
    format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {USER_LIST_FILTER} \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4"
    )
}

/// Total rows matched by [`list_users`], ignoring the page
#[must_use]
pub fn count_users() -> String {
    format!("SELECT COUNT(*) AS count FROM users WHERE {USER_LIST_FILTER}")
}

/// Escape `%`, `_` and `\` so user text matches literally inside `LIKE`
#[must_use]
pub fn like_pattern(search: &str) -> String {
    let escaped: String = search
        .trim()
        .to_lowercase()
        .chars()
        .flat_map(|c| match c {
            '%' | '_' | '\\' => vec!['\\', c],
            other => vec![other],
        })
        .collect();
    format!("%{escaped}%")
}
