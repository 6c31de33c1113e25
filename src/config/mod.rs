// ABOUTME: Configuration module re-exporting environment and rate limit settings
// ABOUTME: All runtime configuration is read from environment variables
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Server, database, auth, email and lifecycle configuration
pub mod environment;
/// Rate limiter backend and Redis connection configuration
pub mod rate_limit;

pub use environment::{
    AuthConfig, DatabaseConfig, DatabaseUrl, EmailConfig, Environment, LifecycleConfig,
    ServerConfig,
};
pub use rate_limit::{RateLimitBackend, RateLimitConfig, RedisConnectionConfig};
