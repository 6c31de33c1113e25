// ABOUTME: Main library entry point for the account lifecycle server
// ABOUTME: Registration, sessions, verification flows, soft deletion and anonymization over HTTP
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # Account Server
//!
//! A JSON API for the full lifecycle of a user account: sign-up with email
//! verification, password sign-in backed by revocable sessions, password
//! reset and email change through one-time emailed links, and account
//! deletion with a restore window followed by anonymization.
//!
//! ## Architecture
//!
//! - **Routes**: thin axum handlers that authenticate and call a service
//! - **Services**: the account actions, each returning an `ActionResult`
//! - **Database plugins**: SQLite by default, PostgreSQL behind a feature
//! - **Rate limiting**: fixed windows in memory or Redis, failing open
//! - **Email**: Resend over HTTPS, or the log in development
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use account_server::config::ServerConfig;
//! use account_server::resources::ServerResources;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let resources = Arc::new(ServerResources::from_config(config).await?);
//!     account_server::server::serve(resources).await
//! }
//! ```

/// Session token signing and validation
pub mod auth;

/// Environment configuration
pub mod config;

/// Database abstraction with SQLite and PostgreSQL backends
pub mod database_plugins;

/// Transactional email delivery and templates
pub mod email;

/// Error types shared with `account-core`
pub mod errors;

/// Structured logging setup and domain log events
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// Attempt counting for credential and verification actions
pub mod rate_limiting;

/// Shared server resources
pub mod resources;

/// HTTP routes
pub mod routes;

/// Password hashing, tokens, cookies and security headers
pub mod security;

/// Server assembly and graceful shutdown
pub mod server;

/// Account actions
pub mod services;

/// Request validation rules
pub mod validation;
