// ABOUTME: Fixed-window rate limiting for credential and verification actions
// ABOUTME: Counts attempts in Redis, Upstash REST or memory and fails open when the store is down
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Rate Limiting
//!
//! Each [`RateLimitAction`] has a budget per fixed window. A window starts on
//! the first attempt for a key and the counter expires with it. When the
//! counter store cannot be reached the request is allowed and the decision is
//! marked `degraded`: an outage of the limiter must never lock users out.

/// In-process LRU store
pub mod memory;
/// Redis store over the native protocol
pub mod redis;
/// Upstash Redis store over HTTP
pub mod upstash;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use account_core::constants::rate_limits;
use account_core::errors::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::{RateLimitBackend, RateLimitConfig};
use crate::logging::AppLogger;

pub use self::redis::RedisStore;
pub use memory::InMemoryStore;
pub use upstash::UpstashRestStore;

/// Operations that are throttled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    /// Password sign-in, keyed by IP and email
    Login,
    /// Account creation, keyed by IP
    Register,
    /// Password reset email, keyed by email
    PasswordResetRequest,
    /// Password reset submission, keyed by IP
    PasswordReset,
    /// Authenticated password change, keyed by user
    ChangePassword,
    /// Email change request, keyed by user
    EmailChange,
    /// Verification email resend, keyed by user
    ResendVerification,
    /// Account deletion, keyed by user
    DeleteAccount,
    /// Account restore, keyed by IP and email
    RestoreAccount,
}

impl RateLimitAction {
    /// Every action, for configuration listings
    pub const ALL: [Self; 9] = [
        Self::Login,
        Self::Register,
        Self::PasswordResetRequest,
        Self::PasswordReset,
        Self::ChangePassword,
        Self::EmailChange,
        Self::ResendVerification,
        Self::DeleteAccount,
        Self::RestoreAccount,
    ];

    /// Name used in store keys and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::PasswordResetRequest => "password_reset_request",
            Self::PasswordReset => "password_reset",
            Self::ChangePassword => "change_password",
            Self::EmailChange => "email_change",
            Self::ResendVerification => "resend_verification",
            Self::DeleteAccount => "delete_account",
            Self::RestoreAccount => "restore_account",
        }
    }

    /// Built-in budget for this action
    #[must_use]
    pub const fn default_policy(&self) -> RateLimitPolicy {
        let (limit, window_secs) = match self {
            Self::Login => (rate_limits::LOGIN_LIMIT, rate_limits::LOGIN_WINDOW_SECS),
            Self::Register => (rate_limits::REGISTER_LIMIT, rate_limits::REGISTER_WINDOW_SECS),
            Self::PasswordResetRequest => (
                rate_limits::PASSWORD_RESET_REQUEST_LIMIT,
                rate_limits::PASSWORD_RESET_REQUEST_WINDOW_SECS,
            ),
            Self::PasswordReset => (
                rate_limits::PASSWORD_RESET_LIMIT,
                rate_limits::PASSWORD_RESET_WINDOW_SECS,
            ),
            Self::ChangePassword => (
                rate_limits::CHANGE_PASSWORD_LIMIT,
                rate_limits::CHANGE_PASSWORD_WINDOW_SECS,
            ),
            Self::EmailChange => (
                rate_limits::EMAIL_CHANGE_LIMIT,
                rate_limits::EMAIL_CHANGE_WINDOW_SECS,
            ),
            Self::ResendVerification => (
                rate_limits::RESEND_VERIFICATION_LIMIT,
                rate_limits::RESEND_VERIFICATION_WINDOW_SECS,
            ),
            Self::DeleteAccount => (
                rate_limits::DELETE_ACCOUNT_LIMIT,
                rate_limits::DELETE_ACCOUNT_WINDOW_SECS,
            ),
            Self::RestoreAccount => (
                rate_limits::RESTORE_ACCOUNT_LIMIT,
                rate_limits::RESTORE_ACCOUNT_WINDOW_SECS,
            ),
        };
        RateLimitPolicy {
            limit,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Store key for `identifier` under this action
    #[must_use]
    pub fn key(&self, identifier: &str) -> String {
        format!(
            "{}:{}:{}",
            rate_limits::KEY_PREFIX,
            self.as_str(),
            identifier.trim().to_lowercase()
        )
    }
}

impl fmt::Display for RateLimitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempts allowed per window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Attempts allowed in one window
    pub limit: u32,
    /// Window length
    pub window: Duration,
}

/// Counter state after recording one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Attempts in the current window, including this one
    pub count: u64,
    /// Seconds until the window closes
    pub ttl_secs: u64,
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the attempt may proceed
    pub allowed: bool,
    /// Attempts allowed per window
    pub limit: u32,
    /// Attempts left in the current window
    pub remaining: u32,
    /// When the current window closes
    pub reset_at: DateTime<Utc>,
    /// The store could not be consulted and the attempt was let through
    pub degraded: bool,
}

impl RateLimitDecision {
    /// Seconds until the window closes, never negative
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        u64::try_from((self.reset_at - Utc::now()).num_seconds().max(0)).unwrap_or(0)
    }

    fn unlimited(policy: RateLimitPolicy, degraded: bool) -> Self {
        Self {
            allowed: true,
            limit: policy.limit,
            remaining: policy.limit,
            reset_at: Utc::now() + window_as_chrono(policy.window),
            degraded,
        }
    }
}

/// Counter storage for fixed windows
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record an attempt on `key`, starting a window of `window` if none is open
    async fn hit(&self, key: &str, window: Duration) -> AppResult<WindowHit>;

    /// Drop the counter for `key`
    async fn reset(&self, key: &str) -> AppResult<()>;

    /// Check the store is reachable
    async fn health_check(&self) -> AppResult<()>;

    /// Short backend name for logs and readiness output
    fn backend_name(&self) -> &'static str;
}

/// Rate limiter shared by every service
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    enabled: bool,
    overrides: HashMap<RateLimitAction, RateLimitPolicy>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backend", &self.store.backend_name())
            .field("enabled", &self.enabled)
            .field("overrides", &self.overrides)
            .finish()
    }
}

impl RateLimiter {
    /// Limiter over an existing store
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>, enabled: bool) -> Self {
        Self {
            store,
            enabled,
            overrides: HashMap::new(),
        }
    }

    /// In-memory limiter, for tests and single-instance development
    #[must_use]
    pub fn in_memory(max_keys: usize) -> Self {
        Self::new(Arc::new(InMemoryStore::new(max_keys)), true)
    }

    /// Build the limiter the configuration asks for
    ///
    /// A Redis server that cannot be reached at startup does not stop the
    /// process: the limiter falls back to process-local counters and logs why.
    pub async fn from_config(config: &RateLimitConfig) -> Self {
        let store: Arc<dyn RateLimitStore> = match &config.backend {
            RateLimitBackend::Redis { url } => {
                match RedisStore::connect(url, &config.redis_connection).await {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        warn!(
                            "Redis rate limit store unavailable, using in-memory counters: {}",
                            e.message
                        );
                        Arc::new(InMemoryStore::new(config.memory_max_keys))
                    }
                }
            }
            RateLimitBackend::UpstashRest { url, token } => {
                match UpstashRestStore::new(url, token, &config.redis_connection) {
                    Ok(store) => Arc::new(store),
                    Err(e) => {
                        warn!(
                            "Upstash rate limit store unavailable, using in-memory counters: {}",
                            e.message
                        );
                        Arc::new(InMemoryStore::new(config.memory_max_keys))
                    }
                }
            }
            RateLimitBackend::Memory => Arc::new(InMemoryStore::new(config.memory_max_keys)),
        };
        tracing::info!(
            backend = store.backend_name(),
            enabled = config.enabled,
            "Rate limiter initialized"
        );
        Self::new(store, config.enabled)
    }

    /// Replace the budget for one action
    #[must_use]
    pub fn with_policy(mut self, action: RateLimitAction, policy: RateLimitPolicy) -> Self {
        self.overrides.insert(action, policy);
        self
    }

    /// Effective budget for `action`
    #[must_use]
    pub fn policy(&self, action: RateLimitAction) -> RateLimitPolicy {
        self.overrides
            .get(&action)
            .copied()
            .unwrap_or_else(|| action.default_policy())
    }

    /// Name of the counter store
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Record an attempt and report whether it is within budget
    pub async fn check(&self, action: RateLimitAction, identifier: &str) -> RateLimitDecision {
        let policy = self.policy(action);
        if !self.enabled {
            return RateLimitDecision::unlimited(policy, false);
        }

        let key = action.key(identifier);
        match self.store.hit(&key, policy.window).await {
            Ok(hit) => {
                let limit = u64::from(policy.limit);
                let decision = RateLimitDecision {
                    allowed: hit.count <= limit,
                    limit: policy.limit,
                    remaining: u32::try_from(limit.saturating_sub(hit.count)).unwrap_or(0),
                    reset_at: Utc::now() + window_as_chrono(Duration::from_secs(hit.ttl_secs)),
                    degraded: false,
                };
                debug!(
                    action = action.as_str(),
                    count = hit.count,
                    limit = policy.limit,
                    allowed = decision.allowed,
                    "Rate limit checked"
                );
                decision
            }
            Err(e) => {
                warn!(
                    action = action.as_str(),
                    backend = self.store.backend_name(),
                    "Rate limit store error, allowing request: {}",
                    e.message
                );
                RateLimitDecision::unlimited(policy, true)
            }
        }
    }

    /// Record an attempt and reject it when over budget
    ///
    /// # Errors
    ///
    /// Returns `RATE_LIMIT_EXCEEDED` carrying the retry delay when the budget is spent
    pub async fn enforce(
        &self,
        action: RateLimitAction,
        identifier: &str,
    ) -> AppResult<RateLimitDecision> {
        let decision = self.check(action, identifier).await;
        if decision.allowed {
            return Ok(decision);
        }
        let retry_after = decision.retry_after_secs();
        AppLogger::log_rate_limited(action.as_str(), identifier, decision.limit, retry_after);
        Err(AppError::rate_limit_exceeded(decision.limit, decision.reset_at, retry_after))
    }

    /// Clear the counter for `identifier`; failures are logged and ignored
    pub async fn reset(&self, action: RateLimitAction, identifier: &str) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.store.reset(&action.key(identifier)).await {
            warn!(
                action = action.as_str(),
                "Failed to reset rate limit counter: {}", e.message
            );
        }
    }

    /// Probe the counter store
    ///
    /// # Errors
    ///
    /// Returns the store's error when it cannot be reached
    pub async fn health_check(&self) -> AppResult<()> {
        self.store.health_check().await
    }
}

fn window_as_chrono(window: Duration) -> chrono::Duration {
    chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Identifier combining client IP and email, for credential actions
#[must_use]
pub fn ip_and_email(ip: &str, email: &str) -> String {
    format!("{ip}:{}", email.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingStore;

    #[async_trait]
    impl RateLimitStore for FailingStore {
        async fn hit(&self, _key: &str, _window: Duration) -> AppResult<WindowHit> {
            Err(AppError::external_service("redis", "connection refused"))
        }

        async fn reset(&self, _key: &str) -> AppResult<()> {
            Err(AppError::external_service("redis", "connection refused"))
        }

        async fn health_check(&self) -> AppResult<()> {
            Err(AppError::external_service("redis", "connection refused"))
        }

        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn test_key_format() {
        assert_eq!(
            RateLimitAction::Login.key(" 10.0.0.1:Jane@Example.com "),
            "ratelimit:login:10.0.0.1:jane@example.com"
        );
    }

    #[test]
    fn test_default_policies() {
        let login = RateLimitAction::Login.default_policy();
        assert_eq!(login.limit, 5);
        assert_eq!(login.window, Duration::from_secs(900));
        let reset = RateLimitAction::PasswordResetRequest.default_policy();
        assert_eq!(reset.limit, 3);
        assert_eq!(reset.window, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_blocks_after_limit() {
        let limiter = RateLimiter::in_memory(100).with_policy(
            RateLimitAction::Login,
            RateLimitPolicy {
                limit: 2,
                window: Duration::from_secs(60),
            },
        );

        let first = limiter.check(RateLimitAction::Login, "a").await;
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert!(limiter.check(RateLimitAction::Login, "a").await.allowed);

        let third = limiter.check(RateLimitAction::Login, "a").await;
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert!(third.retry_after_secs() <= 60);

        // Independent identifiers and actions have their own windows
        assert!(limiter.check(RateLimitAction::Login, "b").await.allowed);
        assert!(limiter.check(RateLimitAction::Register, "a").await.allowed);
    }

    #[tokio::test]
    async fn test_enforce_returns_rate_limit_error() {
        let limiter = RateLimiter::in_memory(100).with_policy(
            RateLimitAction::DeleteAccount,
            RateLimitPolicy {
                limit: 1,
                window: Duration::from_secs(60),
            },
        );
        limiter
            .enforce(RateLimitAction::DeleteAccount, "u")
            .await
            .unwrap();
        let err = limiter
            .enforce(RateLimitAction::DeleteAccount, "u")
            .await
            .unwrap_err();
        assert_eq!(err.code, account_core::errors::ErrorCode::RateLimitExceeded);
        assert!(err.retry_after_secs().is_some());
    }

    #[tokio::test]
    async fn test_reset_clears_window() {
        let limiter = RateLimiter::in_memory(100).with_policy(
            RateLimitAction::Login,
            RateLimitPolicy {
                limit: 1,
                window: Duration::from_secs(60),
            },
        );
        assert!(limiter.check(RateLimitAction::Login, "x").await.allowed);
        assert!(!limiter.check(RateLimitAction::Login, "x").await.allowed);
        limiter.reset(RateLimitAction::Login, "x").await;
        assert!(limiter.check(RateLimitAction::Login, "x").await.allowed);
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let limiter = RateLimiter::new(Arc::new(FailingStore), true);
        for _ in 0..10 {
            let decision = limiter.check(RateLimitAction::Login, "x").await;
            assert!(decision.allowed);
            assert!(decision.degraded);
        }
        limiter.reset(RateLimitAction::Login, "x").await;
        assert!(limiter.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_disabled_limiter_allows_everything() {
        let limiter = RateLimiter::new(Arc::new(InMemoryStore::new(10)), false);
        for _ in 0..20 {
            let decision = limiter.check(RateLimitAction::Register, "x").await;
            assert!(decision.allowed);
            assert!(!decision.degraded);
        }
    }
}
