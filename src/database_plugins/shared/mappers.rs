// ABOUTME: Model to SQL row conversion helpers for database operations.
// ABOUTME: Generic row parsing that works for both PostgreSQL and SQLite rows.
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Model <-> SQL row conversion helpers
//!
//! Identifiers are stored as text in both backends so one set of parsers
//! covers `PgRow` and `SqliteRow`.

use account_core::errors::{AppError, AppResult};
use account_core::models::{
    LinkedAccount, Notification, NotificationKind, Session, TokenPurpose, User, UserRole,
    VerificationToken,
};
use chrono::{DateTime, Utc};
use sqlx::{ColumnIndex, Decode, Row, Type};
use uuid::Uuid;

fn column<R, T>(row: &R, name: &str) -> AppResult<T>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    T: for<'a> Decode<'a, R::Database> + Type<R::Database>,
{
    row.try_get(name)
        .map_err(|e| AppError::database(format!("Failed to get column '{name}': {e}")))
}

fn uuid_column<R>(row: &R, name: &str) -> AppResult<Uuid>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    String: for<'a> Decode<'a, R::Database> + Type<R::Database>,
{
    let raw: String = column(row, name)?;
    Uuid::parse_str(&raw)
        .map_err(|e| AppError::database(format!("Invalid UUID in column '{name}': {e}")))
}

/// Parse a `User` from a row selected with [`super::queries::USER_COLUMNS`]
///
/// # Errors
///
/// Returns a database error if a column is missing or holds an unexpected value
pub fn parse_user<R>(row: &R) -> AppResult<User>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    String: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    Option<String>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    bool: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    DateTime<Utc>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    Option<DateTime<Utc>>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
{
    let role: String = column(row, "role")?;
    Ok(User {
        id: uuid_column(row, "id")?,
        name: column(row, "name")?,
        username: column(row, "username")?,
        email: column(row, "email")?,
        email_verified_at: column(row, "email_verified_at")?,
        image: column(row, "image")?,
        password_hash: column(row, "password_hash")?,
        role: role
            .parse::<UserRole>()
            .map_err(|e| AppError::database(e.message))?,
        is_deleted: column(row, "is_deleted")?,
        deleted_at: column(row, "deleted_at")?,
        anonymized_at: column(row, "anonymized_at")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

/// Parse a `Session` row
///
/// # Errors
///
/// Returns a database error if a column is missing or holds an unexpected value
pub fn parse_session<R>(row: &R) -> AppResult<Session>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    String: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    Option<String>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    DateTime<Utc>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
{
    Ok(Session {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        expires_at: column(row, "expires_at")?,
        created_at: column(row, "created_at")?,
        ip_address: column(row, "ip_address")?,
        user_agent: column(row, "user_agent")?,
    })
}

/// Parse a `VerificationToken` row
///
/// # Errors
///
/// Returns a database error if a column is missing or holds an unexpected value
pub fn parse_verification_token<R>(row: &R) -> AppResult<VerificationToken>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    String: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    Option<String>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    DateTime<Utc>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
{
    let purpose: String = column(row, "purpose")?;
    Ok(VerificationToken {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        purpose: purpose
            .parse::<TokenPurpose>()
            .map_err(|e| AppError::database(e.message))?,
        token_hash: column(row, "token_hash")?,
        new_email: column(row, "new_email")?,
        expires_at: column(row, "expires_at")?,
        created_at: column(row, "created_at")?,
    })
}

/// Parse a `Notification` row
///
/// # Errors
///
/// Returns a database error if a column is missing or holds an unexpected value
pub fn parse_notification<R>(row: &R) -> AppResult<Notification>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    String: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    DateTime<Utc>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    Option<DateTime<Utc>>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
{
    let kind: String = column(row, "kind")?;
    Ok(Notification {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        kind: kind
            .parse::<NotificationKind>()
            .map_err(|e| AppError::database(e.message))?,
        title: column(row, "title")?,
        body: column(row, "body")?,
        read_at: column(row, "read_at")?,
        created_at: column(row, "created_at")?,
    })
}

/// Parse a `LinkedAccount` row
///
/// # Errors
///
/// Returns a database error if a column is missing or holds an unexpected value
pub fn parse_linked_account<R>(row: &R) -> AppResult<LinkedAccount>
where
    R: Row,
    for<'a> &'a str: ColumnIndex<R>,
    String: for<'a> Decode<'a, R::Database> + Type<R::Database>,
    DateTime<Utc>: for<'a> Decode<'a, R::Database> + Type<R::Database>,
{
    Ok(LinkedAccount {
        id: uuid_column(row, "id")?,
        user_id: uuid_column(row, "user_id")?,
        provider: column(row, "provider")?,
        provider_account_id: column(row, "provider_account_id")?,
        account_type: column(row, "account_type")?,
        created_at: column(row, "created_at")?,
    })
}

/// Stored form of an anonymized user's email address
#[must_use]
pub fn anonymized_email(user_id: Uuid) -> String {
    format!(
        "deleted-{user_id}@{}",
        account_core::constants::lifecycle::ANONYMIZED_EMAIL_DOMAIN
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymized_email_is_unique_per_user() {
        let a = anonymized_email(Uuid::new_v4());
        let b = anonymized_email(Uuid::new_v4());
        assert_ne!(a, b);
        assert!(a.starts_with("deleted-"));
        assert!(a.ends_with("@deleted.invalid"));
    }
}
