// ABOUTME: Shared server resources handed to every route and service
// ABOUTME: Builds the database, session signer, rate limiter and email service once at startup
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use account_core::errors::AppResult;
use chrono::Duration;
use tracing::info;

use crate::auth::AuthManager;
use crate::config::ServerConfig;
use crate::database_plugins::factory::Database;
use crate::email::EmailService;
use crate::rate_limiting::RateLimiter;

/// Everything a request handler needs, created once and shared behind an `Arc`
#[derive(Clone)]
pub struct ServerResources {
    /// Runtime configuration
    pub config: Arc<ServerConfig>,
    /// Account database
    pub database: Arc<Database>,
    /// Session token signer
    pub auth_manager: Arc<AuthManager>,
    /// Attempt counters for credential and verification actions
    pub rate_limiter: RateLimiter,
    /// Transactional email
    pub email: EmailService,
}

impl ServerResources {
    /// Assemble resources from already-built parts
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        database: Database,
        rate_limiter: RateLimiter,
        email: EmailService,
    ) -> Self {
        let auth_manager = Arc::new(AuthManager::new(&config.auth.jwt_secret));
        Self {
            config,
            database: Arc::new(database),
            auth_manager,
            rate_limiter,
            email,
        }
    }

    /// Connect every backend named in `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the email client cannot be built
    pub async fn from_config(config: ServerConfig) -> AppResult<Self> {
        let database = Database::new(
            &config.database.url.to_connection_string(),
            config.database.max_connections,
        )
        .await?;
        info!("Database backend: {}", database.backend_info());

        let rate_limiter = RateLimiter::from_config(&config.rate_limit).await;
        info!("Rate limit store: {}", rate_limiter.backend_name());

        let email = EmailService::from_config(&config.email, config.app_url.clone())?;

        Ok(Self::new(Arc::new(config), database, rate_limiter, email))
    }

    /// Lifetime of a newly created session
    #[must_use]
    pub fn session_lifetime(&self) -> Duration {
        Duration::hours(self.config.auth.session_lifetime_hours)
    }

    /// Grace period between soft deletion and anonymization
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.config.lifecycle.grace_period()
    }

    /// bcrypt work factor
    #[must_use]
    pub fn bcrypt_cost(&self) -> u32 {
        self.config.auth.bcrypt_cost
    }

    /// Whether cookies must carry the `Secure` attribute
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.config.environment.is_production()
    }
}
