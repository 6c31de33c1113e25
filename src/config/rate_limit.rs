// ABOUTME: Rate limiting configuration: backend selection, Redis connection tuning and policies
// ABOUTME: Chooses Redis, Upstash REST or in-memory storage from environment variables
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::env;
use std::fmt;

/// Where rate limit counters live
#[derive(Clone, PartialEq, Eq)]
pub enum RateLimitBackend {
    /// Redis over the native protocol (`REDIS_URL`)
    Redis {
        /// Connection URL
        url: String,
    },
    /// Upstash Redis over its REST API
    UpstashRest {
        /// REST endpoint (`UPSTASH_REDIS_REST_URL`)
        url: String,
        /// Bearer token (`UPSTASH_REDIS_REST_TOKEN`)
        token: String,
    },
    /// Process-local counters; not shared between instances
    Memory,
}

impl RateLimitBackend {
    /// Pick a backend: `REDIS_URL` first, then the Upstash REST pair, else memory
    #[must_use]
    pub fn from_env() -> Self {
        if let Ok(url) = env::var("REDIS_URL") {
            if !url.trim().is_empty() {
                return Self::Redis { url };
            }
        }
        match (
            env::var("UPSTASH_REDIS_REST_URL"),
            env::var("UPSTASH_REDIS_REST_TOKEN"),
        ) {
            (Ok(url), Ok(token)) if !url.trim().is_empty() && !token.trim().is_empty() => {
                Self::UpstashRest { url, token }
            }
            _ => Self::Memory,
        }
    }

    /// Short label for logs
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Redis { .. } => "redis",
            Self::UpstashRest { .. } => "upstash-rest",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Debug for RateLimitBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redis { .. } => f.write_str("Redis { url: <redacted> }"),
            Self::UpstashRest { url, .. } => {
                write!(f, "UpstashRest {{ url: {url}, token: <redacted> }}")
            }
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Master switch; a disabled limiter allows every request
    pub enabled: bool,
    /// Counter storage
    pub backend: RateLimitBackend,
    /// Redis connection tuning
    pub redis_connection: RedisConnectionConfig,
    /// Maximum windows tracked by the in-memory store
    pub memory_max_keys: usize,
}

impl RateLimitConfig {
    /// Load rate limit configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("RATE_LIMIT_ENABLED").map_or(true, |v| v != "false" && v != "0"),
            backend: RateLimitBackend::from_env(),
            redis_connection: RedisConnectionConfig::from_env(),
            memory_max_keys: parse_or("RATE_LIMIT_MEMORY_MAX_KEYS", 10_000),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: RateLimitBackend::Memory,
            redis_connection: RedisConnectionConfig::default(),
            memory_max_keys: 10_000,
        }
    }
}

/// Redis connection and retry configuration
///
/// Timeouts are short: a slow Redis must not stall sign-in, since the limiter
/// fails open anyway.
#[derive(Debug, Clone)]
pub struct RedisConnectionConfig {
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// Response/command timeout in milliseconds
    pub response_timeout_ms: u64,
    /// Number of reconnection retries after connection drop
    pub reconnection_retries: usize,
    /// Exponential backoff base for retry delays
    pub retry_exponent_base: u64,
    /// Maximum retry delay in milliseconds
    pub max_retry_delay_ms: u64,
    /// Number of retries for initial connection at startup
    pub initial_connection_retries: u32,
    /// Initial retry delay in milliseconds (doubles with exponential backoff)
    pub initial_retry_delay_ms: u64,
}

impl Default for RedisConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 2,
            response_timeout_ms: 500,
            reconnection_retries: 3,
            retry_exponent_base: 2,
            max_retry_delay_ms: 2_000,
            initial_connection_retries: 3,
            initial_retry_delay_ms: 250,
        }
    }
}

impl RedisConnectionConfig {
    /// Load Redis connection configuration from environment
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connection_timeout_secs: parse_or(
                "REDIS_CONNECTION_TIMEOUT_SECS",
                defaults.connection_timeout_secs,
            ),
            response_timeout_ms: parse_or(
                "REDIS_RESPONSE_TIMEOUT_MS",
                defaults.response_timeout_ms,
            ),
            reconnection_retries: parse_or(
                "REDIS_RECONNECTION_RETRIES",
                defaults.reconnection_retries,
            ),
            retry_exponent_base: parse_or(
                "REDIS_RETRY_EXPONENT_BASE",
                defaults.retry_exponent_base,
            ),
            max_retry_delay_ms: parse_or("REDIS_MAX_RETRY_DELAY_MS", defaults.max_retry_delay_ms),
            initial_connection_retries: parse_or(
                "REDIS_INITIAL_CONNECTION_RETRIES",
                defaults.initial_connection_retries,
            ),
            initial_retry_delay_ms: parse_or(
                "REDIS_INITIAL_RETRY_DELAY_MS",
                defaults.initial_retry_delay_ms,
            ),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        for key in ["REDIS_URL", "UPSTASH_REDIS_REST_URL", "UPSTASH_REDIS_REST_TOKEN"] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_backend_prefers_redis_url() {
        clear();
        env::set_var("REDIS_URL", "redis://localhost:6379");
        env::set_var("UPSTASH_REDIS_REST_URL", "https://example.upstash.io");
        env::set_var("UPSTASH_REDIS_REST_TOKEN", "tok");
        assert_eq!(RateLimitBackend::from_env().label(), "redis");
        clear();
    }

    #[test]
    #[serial]
    fn test_backend_upstash_requires_token() {
        clear();
        env::set_var("UPSTASH_REDIS_REST_URL", "https://example.upstash.io");
        assert_eq!(RateLimitBackend::from_env(), RateLimitBackend::Memory);
        env::set_var("UPSTASH_REDIS_REST_TOKEN", "tok");
        assert_eq!(RateLimitBackend::from_env().label(), "upstash-rest");
        clear();
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let backend = RateLimitBackend::UpstashRest {
            url: "https://example.upstash.io".into(),
            token: "super-secret".into(),
        };
        assert!(!format!("{backend:?}").contains("super-secret"));
    }
}
