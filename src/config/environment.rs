// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Parses database, auth, email, lifecycle and rate limit settings from environment variables
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Environment-based configuration
//!
//! Every setting comes from the process environment, with an optional `.env`
//! file loaded first for local development.

use std::env;
use std::fmt;
use std::path::PathBuf;

use account_core::constants::{lifecycle, ports, sessions};
use anyhow::{anyhow, Context, Result};
use rand::RngCore;
use tracing::{info, warn};
use url::Url;

use super::rate_limit::RateLimitConfig;

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Deployed
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// File path
        path: PathBuf,
    },
    /// `PostgreSQL` connection
    PostgreSQL {
        /// Full connection string
        connection_string: String,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string with validation
    ///
    /// # Errors
    ///
    /// Returns an error for an empty string
    pub fn parse_url(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow!("DATABASE_URL is empty"));
        }
        if let Some(path) = s.strip_prefix("sqlite:") {
            let path = path.trim_start_matches("//");
            if path == ":memory:" {
                Ok(Self::Memory)
            } else {
                Ok(Self::SQLite {
                    path: PathBuf::from(path),
                })
            }
        } else if s.starts_with("postgresql://") || s.starts_with("postgres://") {
            Ok(Self::PostgreSQL {
                connection_string: s.to_owned(),
            })
        } else {
            Ok(Self::SQLite {
                path: PathBuf::from(s),
            })
        }
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::PostgreSQL { connection_string } => connection_string.clone(),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    /// Check if this is a `SQLite` database
    #[must_use]
    pub const fn is_sqlite(&self) -> bool {
        matches!(self, Self::SQLite { .. } | Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/accounts.db"),
        }
    }
}

/// Database settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Where the database lives
    pub url: DatabaseUrl,
    /// Pool size
    pub max_connections: u32,
}

/// Session signing settings
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for session tokens
    pub jwt_secret: Vec<u8>,
    /// Session lifetime
    pub session_lifetime_hours: i64,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("session_lifetime_hours", &self.session_lifetime_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

/// Outgoing email settings
#[derive(Clone)]
pub struct EmailConfig {
    /// Resend API key; the console provider is used when absent
    pub resend_api_key: Option<String>,
    /// Resend API base URL
    pub resend_api_url: String,
    /// Sender address
    pub from_address: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("resend_api_key", &self.resend_api_key.as_ref().map(|_| "<redacted>"))
            .field("resend_api_url", &self.resend_api_url)
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Soft delete and cleanup settings
#[derive(Clone)]
pub struct LifecycleConfig {
    /// Days a deleted account stays restorable
    pub grace_period_days: i64,
    /// Bearer secret for the cleanup cron endpoint
    pub cron_secret: Option<String>,
}

impl LifecycleConfig {
    /// Grace period as a duration
    #[must_use]
    pub fn grace_period(&self) -> chrono::Duration {
        chrono::Duration::days(self.grace_period_days)
    }
}

impl fmt::Debug for LifecycleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleConfig")
            .field("grace_period_days", &self.grace_period_days)
            .field("cron_secret", &self.cron_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// HTTP listen address
    pub host: String,
    /// Deployment environment
    pub environment: Environment,
    /// Public base URL used in emailed links
    pub app_url: Url,
    /// Database settings
    pub database: DatabaseConfig,
    /// Session settings
    pub auth: AuthConfig,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
    /// Email settings
    pub email: EmailConfig,
    /// Account lifecycle settings
    pub lifecycle: LifecycleConfig,
    /// Allowed CORS origins (`*` for any)
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed, or if `AUTH_SECRET` is
    /// missing in production
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {e}");
        }

        let environment =
            Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development"));

        let app_url = env::var("APP_URL")
            .or_else(|_| env::var("NEXTAUTH_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let app_url =
            Url::parse(&app_url).with_context(|| format!("Invalid APP_URL value: {app_url}"))?;

        let config = Self {
            http_port: env_var_or("HTTP_PORT", &ports::DEFAULT_HTTP_PORT.to_string())
                .parse()
                .context("Invalid HTTP_PORT value")?,
            host: env_var_or("HOST", "0.0.0.0"),
            environment,
            app_url,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .ok()
                    .map(|url| DatabaseUrl::parse_url(&url))
                    .transpose()?
                    .unwrap_or_default(),
                max_connections: env_var_or("DATABASE_MAX_CONNECTIONS", "10")
                    .parse()
                    .context("Invalid DATABASE_MAX_CONNECTIONS value")?,
            },
            auth: AuthConfig {
                jwt_secret: load_jwt_secret(environment)?,
                session_lifetime_hours: env_var_or(
                    "SESSION_LIFETIME_HOURS",
                    &sessions::DEFAULT_SESSION_HOURS.to_string(),
                )
                .parse()
                .context("Invalid SESSION_LIFETIME_HOURS value")?,
                bcrypt_cost: env_var_or("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())
                    .parse()
                    .context("Invalid BCRYPT_COST value")?,
            },
            rate_limit: RateLimitConfig::from_env(),
            email: EmailConfig {
                resend_api_key: env::var("RESEND_API_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty()),
                resend_api_url: env_var_or("RESEND_API_URL", "https://api.resend.com"),
                from_address: env_var_or("EMAIL_FROM", "Accounts <no-reply@localhost>"),
            },
            lifecycle: LifecycleConfig {
                grace_period_days: env_var_or(
                    "ACCOUNT_DELETION_GRACE_DAYS",
                    &lifecycle::DELETION_GRACE_PERIOD_DAYS.to_string(),
                )
                .parse()
                .context("Invalid ACCOUNT_DELETION_GRACE_DAYS value")?,
                cron_secret: env::var("CRON_SECRET")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            },
            cors_origins: parse_origins(&env_var_or("CORS_ORIGINS", "*")),
        };

        config.validate()?;
        info!("Configuration loaded: {}", config.summary());
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error for values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.lifecycle.grace_period_days < 0 {
            return Err(anyhow!("ACCOUNT_DELETION_GRACE_DAYS must not be negative"));
        }
        if self.auth.session_lifetime_hours <= 0 {
            return Err(anyhow!("SESSION_LIFETIME_HOURS must be positive"));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(anyhow!("BCRYPT_COST must be between 4 and 31"));
        }
        if self.lifecycle.cron_secret.is_none() {
            warn!("CRON_SECRET is not set; the cleanup cron endpoint will reject every call");
        }
        if self.email.resend_api_key.is_none() {
            warn!("RESEND_API_KEY is not set; emails are written to the log instead of sent");
        }
        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "environment={}, http={}:{}, app_url={}, database={}, rate_limit={} ({}), email={}, grace_period_days={}, cron={}",
            self.environment,
            self.host,
            self.http_port,
            self.app_url,
            if self.database.url.is_sqlite() {
                "SQLite"
            } else {
                "PostgreSQL"
            },
            if self.rate_limit.enabled {
                "enabled"
            } else {
                "disabled"
            },
            self.rate_limit.backend.label(),
            if self.email.resend_api_key.is_some() {
                "resend"
            } else {
                "console"
            },
            self.lifecycle.grace_period_days,
            if self.lifecycle.cron_secret.is_some() {
                "configured"
            } else {
                "missing"
            },
        )
    }
}

fn load_jwt_secret(environment: Environment) -> Result<Vec<u8>> {
    match env::var("AUTH_SECRET").or_else(|_| env::var("NEXTAUTH_SECRET")) {
        Ok(secret) if secret.len() >= 32 => Ok(secret.into_bytes()),
        Ok(_) => Err(anyhow!("AUTH_SECRET must be at least 32 characters")),
        Err(_) if environment.is_production() => {
            Err(anyhow!("AUTH_SECRET is required in production"))
        }
        Err(_) => {
            warn!("AUTH_SECRET not set; sessions will not survive a restart");
            let mut secret = vec![0u8; 64];
            rand::thread_rng().fill_bytes(&mut secret);
            Ok(secret)
        }
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse comma-separated CORS origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
