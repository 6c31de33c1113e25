// ABOUTME: Database abstraction layer for account storage
// ABOUTME: Plugin architecture with SQLite (default) and PostgreSQL backends behind one trait

//! # Database Plugins
//!
//! Services only see [`DatabaseProvider`]. [`factory::Database`] picks the
//! backend from the connection string and delegates every call.

use account_core::errors::AppResult;
use account_core::models::{
    LinkedAccount, Notification, Session, TokenPurpose, User, UserRole, VerificationToken,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod factory;
/// Row mapping and transaction helpers shared by both backends
pub mod shared;
pub mod sqlite;

#[cfg(feature = "postgresql")]
pub mod postgres;

/// Filter for admin user listings
#[derive(Debug, Clone, Default)]
pub struct UserListFilter {
    /// Include soft-deleted and anonymized accounts
    pub include_deleted: bool,
    /// Case-insensitive substring of email, name or username
    pub search: Option<String>,
    /// Page size
    pub limit: u32,
    /// Rows to skip
    pub offset: u32,
}

/// Core database abstraction trait
///
/// All database implementations must implement this trait to provide
/// a consistent interface for the application layer.
#[async_trait]
pub trait DatabaseProvider: Send + Sync + Clone {
    /// Connect and create the schema
    async fn new(database_url: &str, max_connections: u32) -> AppResult<Self>
    where
        Self: Sized;

    /// Create tables and indexes if they do not exist
    async fn migrate(&self) -> AppResult<()>;

    /// Run a trivial query to prove the connection works
    async fn health_check(&self) -> AppResult<()>;

    // ================================
    // Users
    // ================================

    /// Insert a new user; duplicate email or username yields `RESOURCE_ALREADY_EXISTS`
    async fn create_user(&self, user: &User) -> AppResult<()>;

    /// Get user by ID
    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>>;

    /// Get user by normalized email address
    async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Get user by username (case-insensitive)
    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Persist name, username and image of `user`
    async fn update_user_profile(&self, user: &User) -> AppResult<()>;

    /// Replace the password hash
    async fn update_password(&self, user_id: Uuid, password_hash: &str) -> AppResult<()>;

    /// Replace the email address and its verification timestamp
    async fn update_email(
        &self,
        user_id: Uuid,
        email: &str,
        verified_at: Option<DateTime<Utc>>,
    ) -> AppResult<()>;

    /// Record that the email address was confirmed
    async fn mark_email_verified(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    /// Change the role
    async fn update_user_role(&self, user_id: Uuid, role: UserRole) -> AppResult<()>;

    /// Flag an active user deleted as of `at`; false if already deleted or missing
    async fn soft_delete_user(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<bool>;

    /// Clear the deleted flag of a user not yet anonymized; false if nothing changed
    async fn restore_user(&self, user_id: Uuid) -> AppResult<bool>;

    /// Page of users, newest first
    async fn list_users(&self, filter: &UserListFilter) -> AppResult<Vec<User>>;

    /// Number of users matching the filter, ignoring its page bounds
    async fn count_users(&self, filter: &UserListFilter) -> AppResult<i64>;

    /// Soft-deleted, not yet anonymized users deleted at or before `cutoff`
    async fn list_users_pending_anonymization(&self, cutoff: DateTime<Utc>)
        -> AppResult<Vec<Uuid>>;

    /// Remove personal data of a soft-deleted user and everything they own, atomically
    async fn anonymize_user(&self, user_id: Uuid, at: DateTime<Utc>) -> AppResult<()>;

    // ================================
    // Sessions
    // ================================

    /// Insert a session
    async fn create_session(&self, session: &Session) -> AppResult<()>;

    /// Get session by ID
    async fn get_session(&self, session_id: Uuid) -> AppResult<Option<Session>>;

    /// Delete one session; false if it did not exist
    async fn delete_session(&self, session_id: Uuid) -> AppResult<bool>;

    /// Delete every session of a user except `keep`
    async fn delete_user_sessions(&self, user_id: Uuid, keep: Option<Uuid>) -> AppResult<u64>;

    /// Unexpired sessions of a user, newest first
    async fn list_user_sessions(&self, user_id: Uuid, now: DateTime<Utc>)
        -> AppResult<Vec<Session>>;

    /// Delete sessions that expired at or before `now`
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> AppResult<u64>;

    // ================================
    // Verification tokens
    // ================================

    /// Store a token, replacing earlier tokens of the same user and purpose
    async fn store_verification_token(&self, token: &VerificationToken) -> AppResult<()>;

    /// Find a token by digest and purpose
    async fn find_verification_token(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> AppResult<Option<VerificationToken>>;

    /// Delete a token; false if it was already consumed
    async fn delete_verification_token(&self, token_id: Uuid) -> AppResult<bool>;

    /// Delete a user's tokens, optionally only one purpose
    async fn delete_user_verification_tokens(
        &self,
        user_id: Uuid,
        purpose: Option<TokenPurpose>,
    ) -> AppResult<u64>;

    /// Delete tokens that expired at or before `now`
    async fn purge_expired_verification_tokens(&self, now: DateTime<Utc>) -> AppResult<u64>;

    // ================================
    // Notifications
    // ================================

    /// Insert a notification
    async fn create_notification(&self, notification: &Notification) -> AppResult<()>;

    /// Newest notifications of a user
    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: u32,
    ) -> AppResult<Vec<Notification>>;

    /// Number of unread notifications
    async fn count_unread_notifications(&self, user_id: Uuid) -> AppResult<i64>;

    /// Get notification by ID
    async fn get_notification(&self, notification_id: Uuid) -> AppResult<Option<Notification>>;

    /// Mark one notification read; no-op if already read
    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Mark every unread notification of a user read
    async fn mark_all_notifications_read(&self, user_id: Uuid, at: DateTime<Utc>)
        -> AppResult<u64>;

    /// Delete a notification; false if it did not exist
    async fn delete_notification(&self, notification_id: Uuid) -> AppResult<bool>;

    // ================================
    // Linked accounts
    // ================================

    /// Link a provider account; duplicates yield `RESOURCE_ALREADY_EXISTS`
    async fn create_linked_account(&self, account: &LinkedAccount) -> AppResult<()>;

    /// Provider accounts of a user
    async fn list_linked_accounts(&self, user_id: Uuid) -> AppResult<Vec<LinkedAccount>>;

    /// Get linked account by ID
    async fn get_linked_account(&self, account_id: Uuid) -> AppResult<Option<LinkedAccount>>;

    /// Unlink a provider account; false if it did not exist
    async fn delete_linked_account(&self, account_id: Uuid) -> AppResult<bool>;
}
