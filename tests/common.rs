// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Builds in-memory resources with a captured outbox and signs accounts up and in
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic
)]
//! Shared test utilities for `account_server`
//!
//! Every test gets its own in-memory SQLite database, an in-memory rate
//! limiter and an [`OutboxProvider`] in place of the email service, so
//! tokens sent by email can be read back.

use std::sync::{Arc, Once};

use account_core::models::{PublicUser, User};
use account_server::config::{
    AuthConfig, DatabaseConfig, DatabaseUrl, EmailConfig, Environment, LifecycleConfig,
    RateLimitConfig, ServerConfig,
};
use account_server::database_plugins::{factory::Database, DatabaseProvider};
use account_server::email::outbox::extract_token;
use account_server::email::{EmailService, OutboxProvider};
use account_server::rate_limiting::RateLimiter;
use account_server::resources::ServerResources;
use account_server::server::build_router;
use account_server::services::types::{LoginRequest, RegisterRequest};
use account_server::services::{AuthService, AuthenticatedUser, ClientContext};
use axum::Router;
use sqlx::SqlitePool;
use tempfile::TempDir;
use url::Url;
use uuid::Uuid;

/// Password accepted by the validation rules
pub const TEST_PASSWORD: &str = "correct-horse-42";

/// Bearer secret of the cleanup cron in test configurations
pub const TEST_CRON_SECRET: &str = "test-cron-secret";

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Configuration for an isolated in-memory server
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        host: "127.0.0.1".to_owned(),
        environment: Environment::Testing,
        app_url: Url::parse("http://localhost:3000").expect("valid url"),
        database: DatabaseConfig {
            url: DatabaseUrl::Memory,
            max_connections: 1,
        },
        auth: AuthConfig {
            jwt_secret: b"integration-test-secret-with-enough-bytes".to_vec(),
            session_lifetime_hours: 24,
            bcrypt_cost: 4,
        },
        rate_limit: RateLimitConfig::default(),
        email: EmailConfig {
            resend_api_key: None,
            resend_api_url: "http://localhost:0".to_owned(),
            from_address: "Accounts <no-reply@example.test>".to_owned(),
        },
        lifecycle: LifecycleConfig {
            grace_period_days: 30,
            cron_secret: Some(TEST_CRON_SECRET.to_owned()),
        },
        cors_origins: vec!["*".to_owned()],
    }
}

/// Client context unique to one call, so per-IP limits never accumulate across steps
pub fn unique_client() -> ClientContext {
    ClientContext {
        ip: format!("client-{}", Uuid::new_v4().simple()),
        user_agent: Some("integration-test".to_owned()),
    }
}

/// Unique address for a test account
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.test", Uuid::new_v4().simple())
}

/// Server resources plus the outbox that replaced the email provider
pub struct TestApp {
    pub resources: Arc<ServerResources>,
    pub outbox: Arc<OutboxProvider>,
}

impl TestApp {
    /// Resources over the default test configuration
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Resources over a custom configuration
    pub async fn with_config(config: ServerConfig) -> Self {
        init_test_logging();
        let database = Database::new(&config.database.url.to_connection_string(), 1)
            .await
            .expect("test database");
        let outbox = Arc::new(OutboxProvider::default());
        let email = EmailService::new(outbox.clone(), config.app_url.clone());
        let rate_limiter = RateLimiter::in_memory(config.rate_limit.memory_max_keys);
        let resources = Arc::new(ServerResources::new(
            Arc::new(config),
            database,
            rate_limiter,
            email,
        ));
        Self { resources, outbox }
    }

    /// Resources over a SQLite file in `dir`, plus a second pool on the same
    /// file for statements the provider does not expose (triggers, fixups)
    pub async fn on_disk(dir: &TempDir) -> (Self, SqlitePool) {
        let path = dir.path().join("accounts.db");
        let mut config = test_config();
        config.database.url = DatabaseUrl::SQLite { path: path.clone() };
        let app = Self::with_config(config).await;
        let side = SqlitePool::connect(&format!("sqlite:{}", path.display()))
            .await
            .expect("second connection");
        (app, side)
    }

    /// Full HTTP application
    pub fn router(&self) -> Router {
        build_router(&self.resources)
    }

    /// Auth service over these resources
    pub fn auth(&self) -> AuthService {
        AuthService::new(self.resources.clone())
    }

    /// Register an account through the service
    pub async fn register(&self, email: &str) -> PublicUser {
        let request = RegisterRequest {
            email: email.to_owned(),
            password: TEST_PASSWORD.to_owned(),
            name: Some("Test User".to_owned()),
            username: None,
        };
        self.auth()
            .register(request, &unique_client())
            .await
            .expect("registration succeeds")
            .value
            .user
    }

    /// Sign in and return the session token
    pub async fn login(&self, email: &str, password: &str) -> String {
        let request = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };
        self.auth()
            .login(request, &unique_client())
            .await
            .expect("login succeeds")
            .value
            .token
    }

    /// Register, sign in and resolve the caller
    pub async fn signed_in(&self, prefix: &str) -> (AuthenticatedUser, String) {
        let email = unique_email(prefix);
        self.register(&email).await;
        let token = self.login(&email, TEST_PASSWORD).await;
        let caller = self
            .auth()
            .authenticate(&token)
            .await
            .expect("valid session");
        (caller, token)
    }

    /// Sign in an account that has the admin role
    pub async fn signed_in_admin(&self) -> (AuthenticatedUser, String) {
        let (caller, _) = self.signed_in("admin").await;
        self.resources
            .database
            .update_user_role(caller.user.id, account_core::models::UserRole::Admin)
            .await
            .expect("promote");
        let token = self.login(&caller.user.email, TEST_PASSWORD).await;
        let caller = self
            .auth()
            .authenticate(&token)
            .await
            .expect("valid session");
        (caller, token)
    }

    /// Token from the most recent `template` email sent to `to`
    pub async fn emailed_token(&self, to: &str, template: &str) -> String {
        let message = self
            .outbox
            .last_to(to, template)
            .await
            .unwrap_or_else(|| panic!("no {template} email sent to {to}"));
        extract_token(&message.text).expect("email contains a token link")
    }

    /// Stored user row
    pub async fn user(&self, user_id: Uuid) -> User {
        self.resources
            .database
            .get_user(user_id)
            .await
            .expect("query")
            .expect("user exists")
    }
}

/// `Authorization` header value for a session token
pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
