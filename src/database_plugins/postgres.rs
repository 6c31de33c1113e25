// ABOUTME: PostgreSQL implementation of the account database provider
// ABOUTME: Production backend enabled by the postgresql feature
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use account_core::errors::{AppError, AppResult};
use account_core::models::{
    LinkedAccount, Notification, Session, TokenPurpose, User, UserRole, VerificationToken,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use super::shared::transactions::{retry_transaction, DEFAULT_TRANSACTION_ATTEMPTS};
use super::shared::{mappers, queries};
use super::{DatabaseProvider, UserListFilter};

/// PostgreSQL database implementation
#[derive(Clone)]
pub struct PostgresDatabase {
    pool: Pool<Postgres>,
}

impl PostgresDatabase {
    /// Get a reference to the connection pool
    #[must_use]
    pub const fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    async fn anonymize_once(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let id = user_id.to_string();

        let updated = sqlx::query(queries::ANONYMIZE_USER)
            .bind(&id)
            .bind(mappers::anonymized_email(user_id))
            .bind(at)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(AppError::not_found("Deleted user pending anonymization"));
        }

        for table in queries::USER_OWNED_TABLES {
            sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
                .bind(&id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl DatabaseProvider for PostgresDatabase {
    async fn new(database_url: &str, max_connections: u32) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT,
                username TEXT,
                email TEXT NOT NULL,
                email_verified_at TIMESTAMPTZ,
                image TEXT,
                password_hash TEXT,
                role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                deleted_at TIMESTAMPTZ,
                anonymized_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users(LOWER(username))",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_users_pending_anonymization ON users(is_deleted, deleted_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                ip_address TEXT,
                user_agent TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS verification_tokens (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                purpose TEXT NOT NULL,
                token_hash TEXT NOT NULL UNIQUE,
                new_email TEXT,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_verification_tokens_user ON verification_tokens(user_id, purpose)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                read_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                provider TEXT NOT NULL,
                provider_account_id TEXT NOT NULL,
                account_type TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                UNIQUE (provider, provider_account_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id)")
            .execute(&self.pool)
            .await?;

        debug!("PostgreSQL schema ready");
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ================================
    // Users
    // ================================

    async fn create_user(&self, user: &User) -> AppResult<()> {
        sqlx::query(queries::INSERT_USER)
            .bind(user.id.to_string())
            .bind(&user.name)
            .bind(&user.username)
            .bind(&user.email)
            .bind(user.email_verified_at)
            .bind(&user.image)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.is_deleted)
            .bind(user.deleted_at)
            .bind(user.anonymized_at)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        sqlx::query(&queries::select_user_by("id"))
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| mappers::parse_user(&row))
            .transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        sqlx::query(&queries::select_user_by("email"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| mappers::parse_user(&row))
            .transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        sqlx::query(&queries::select_user_by("LOWER(username)"))
            .bind(username.to_lowercase())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| mappers::parse_user(&row))
            .transpose()
    }

    async fn update_user_profile(&self, user: &User) -> AppResult<()> {
        sqlx::query(queries::UPDATE_USER_PROFILE)
            .bind(user.id.to_string())
            .bind(&user.name)
            .bind(&user.username)
            .bind(&user.image)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<()> {
        sqlx::query(queries::UPDATE_PASSWORD)
            .bind(user_id.to_string())
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_email(
        &self,
        user_id: Uuid,
        email: &str,
        verified_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        sqlx::query(queries::UPDATE_EMAIL)
            .bind(user_id.to_string())
            .bind(email)
            .bind(verified_at)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(queries::MARK_EMAIL_VERIFIED)
            .bind(user_id.to_string())
            .bind(at)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_user_role(&self, user_id: Uuid, role: UserRole) -> AppResult<()> {
        sqlx::query(queries::UPDATE_ROLE)
            .bind(user_id.to_string())
            .bind(role.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn soft_delete_user(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(queries::SOFT_DELETE_USER)
            .bind(user_id.to_string())
            .bind(at)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_user(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(queries::RESTORE_USER)
            .bind(user_id.to_string())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self, filter: &UserListFilter) -> AppResult<Vec<User>> {
        let rows = sqlx::query(&queries::list_users())
            .bind(filter.include_deleted)
            .bind(filter.search.as_deref().map(queries::like_pattern))
            .bind(i64::from(filter.limit))
            .bind(i64::from(filter.offset))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(mappers::parse_user).collect()
    }

    async fn count_users(&self, filter: &UserListFilter) -> AppResult<i64> {
        let row = sqlx::query(&queries::count_users())
            .bind(filter.include_deleted)
            .bind(filter.search.as_deref().map(queries::like_pattern))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    async fn list_users_pending_anonymization(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query(queries::USERS_PENDING_ANONYMIZATION)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id")?;
                Uuid::parse_str(&id)
                    .map_err(|e| AppError::database(format!("Invalid user id {id}: {e}")))
            })
            .collect()
    }

    async fn anonymize_user(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        retry_transaction(
            || self.anonymize_once(user_id, at),
            DEFAULT_TRANSACTION_ATTEMPTS,
        )
        .await
    }

    // ================================
    // Sessions
    // ================================

    async fn create_session(&self, session: &Session) -> AppResult<()> {
        sqlx::query(queries::INSERT_SESSION)
            .bind(session.id.to_string())
            .bind(session.user_id.to_string())
            .bind(session.expires_at)
            .bind(session.created_at)
            .bind(&session.ip_address)
            .bind(&session.user_agent)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<Session>> {
        sqlx::query(&format!(
            "SELECT {} FROM sessions WHERE id = $1",
            queries::SESSION_COLUMNS
        ))
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(|row| mappers::parse_session(&row))
        .transpose()
    }

    async fn delete_session(&self, session_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(queries::DELETE_SESSION)
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_sessions(&self, user_id: Uuid, keep: Option<Uuid>) -> AppResult<u64> {
        let result = sqlx::query(queries::DELETE_USER_SESSIONS)
            .bind(user_id.to_string())
            .bind(keep.map(|id| id.to_string()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_user_sessions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Session>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sessions WHERE user_id = $1 AND expires_at > $2 ORDER BY created_at DESC",
            queries::SESSION_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(mappers::parse_session).collect()
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(queries::PURGE_EXPIRED_SESSIONS)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ================================
    // Verification tokens
    // ================================

    async fn store_verification_token(&self, token: &VerificationToken) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(queries::DELETE_TOKENS_FOR_PURPOSE)
            .bind(token.user_id.to_string())
            .bind(token.purpose.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query(queries::INSERT_VERIFICATION_TOKEN)
            .bind(token.id.to_string())
            .bind(token.user_id.to_string())
            .bind(token.purpose.as_str())
            .bind(&token.token_hash)
            .bind(&token.new_email)
            .bind(token.expires_at)
            .bind(token.created_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_verification_token(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> AppResult<Option<VerificationToken>> {
        sqlx::query(&format!(
            "SELECT {} FROM verification_tokens WHERE token_hash = $1 AND purpose = $2",
            queries::TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(|row| mappers::parse_verification_token(&row))
        .transpose()
    }

    async fn delete_verification_token(&self, token_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(queries::DELETE_TOKEN)
            .bind(token_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_verification_tokens(
        &self,
        user_id: Uuid,
        purpose: Option<TokenPurpose>,
    ) -> AppResult<u64> {
        let result = sqlx::query(queries::DELETE_USER_TOKENS)
            .bind(user_id.to_string())
            .bind(purpose.map(|p| p.as_str()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired_verification_tokens(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(queries::PURGE_EXPIRED_TOKENS)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ================================
    // Notifications
    // ================================

    async fn create_notification(&self, notification: &Notification) -> AppResult<()> {
        sqlx::query(queries::INSERT_NOTIFICATION)
            .bind(notification.id.to_string())
            .bind(notification.user_id.to_string())
            .bind(notification.kind.as_str())
            .bind(&notification.title)
            .bind(&notification.body)
            .bind(notification.read_at)
            .bind(notification.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE user_id = $1 AND ($2 = FALSE OR read_at IS NULL) \
             ORDER BY created_at DESC LIMIT $3",
            queries::NOTIFICATION_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(unread_only)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(mappers::parse_notification).collect()
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> AppResult<i64> {
        let row = sqlx::query(queries::COUNT_UNREAD_NOTIFICATIONS)
            .bind(user_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }

    async fn get_notification(&self, notification_id: Uuid) -> AppResult<Option<Notification>> {
        sqlx::query(&format!(
            "SELECT {} FROM notifications WHERE id = $1",
            queries::NOTIFICATION_COLUMNS
        ))
        .bind(notification_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(|row| mappers::parse_notification(&row))
        .transpose()
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(queries::MARK_NOTIFICATION_READ)
            .bind(notification_id.to_string())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_all_notifications_read(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(queries::MARK_ALL_NOTIFICATIONS_READ)
            .bind(user_id.to_string())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, notification_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(queries::DELETE_NOTIFICATION)
            .bind(notification_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ================================
    // Linked accounts
    // ================================

    async fn create_linked_account(&self, account: &LinkedAccount) -> AppResult<()> {
        sqlx::query(queries::INSERT_ACCOUNT)
            .bind(account.id.to_string())
            .bind(account.user_id.to_string())
            .bind(&account.provider)
            .bind(&account.provider_account_id)
            .bind(&account.account_type)
            .bind(account.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_linked_accounts(&self, user_id: Uuid) -> AppResult<Vec<LinkedAccount>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE user_id = $1 ORDER BY created_at",
            queries::ACCOUNT_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(mappers::parse_linked_account).collect()
    }

    async fn get_linked_account(&self, account_id: Uuid) -> AppResult<Option<LinkedAccount>> {
        sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            queries::ACCOUNT_COLUMNS
        ))
        .bind(account_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(|row| mappers::parse_linked_account(&row))
        .transpose()
    }

    async fn delete_linked_account(&self, account_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(queries::DELETE_ACCOUNT)
            .bind(account_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
