// ABOUTME: Redis-backed rate limit counters using the native protocol
// ABOUTME: One MULTI/EXEC round trip per attempt: INCR, EXPIRE NX and TTL
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::time::Duration;

use account_core::errors::{AppError, AppResult};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::{info, warn};

use super::{RateLimitStore, WindowHit};
use crate::config::RedisConnectionConfig;

/// Fixed-window counters shared by every instance through Redis
///
/// `EXPIRE ... NX` requires Redis 7 or newer.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to `url`, retrying with exponential backoff
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or every connection attempt fails
    pub async fn connect(url: &str, conn_config: &RedisConnectionConfig) -> AppResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::config(format!("Invalid REDIS_URL: {e}")))?;
        let manager = Self::connect_with_retry(&client, conn_config).await?;
        info!("Rate limiter connected to Redis");
        Ok(Self { manager })
    }

    async fn connect_with_retry(
        client: &redis::Client,
        conn_config: &RedisConnectionConfig,
    ) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(conn_config.connection_timeout_secs))
            .set_response_timeout(Duration::from_millis(conn_config.response_timeout_ms))
            .set_number_of_retries(conn_config.reconnection_retries)
            .set_exponent_base(conn_config.retry_exponent_base)
            .set_max_delay(conn_config.max_retry_delay_ms);

        let max_retries = conn_config.initial_connection_retries;
        let max_delay_ms = conn_config.max_retry_delay_ms;
        let mut delay_ms = conn_config.initial_retry_delay_ms;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
                Ok(manager) => {
                    if attempt > 0 {
                        info!("Redis connection established after {} retries", attempt);
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    if attempt < max_retries {
                        warn!(
                            "Redis connection attempt {}/{} failed, retrying in {}ms: {}",
                            attempt + 1,
                            max_retries + 1,
                            delay_ms,
                            e
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(max_delay_ms);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::external_service(
            "redis",
            format!(
                "Failed to connect after {} attempts: {}",
                max_retries + 1,
                last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string())
            ),
        ))
    }
}

fn redis_error(e: &redis::RedisError) -> AppError {
    AppError::external_service("redis", e.to_string())
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn hit(&self, key: &str, window: Duration) -> AppResult<WindowHit> {
        let window_secs = window.as_secs().max(1);
        let mut conn = self.manager.clone();

        let (count, ttl): (u64, i64) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .cmd("EXPIRE")
            .arg(key)
            .arg(window_secs)
            .arg("NX")
            .ignore()
            .ttl(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(&e))?;

        // A negative TTL means the key has no expiry; repair it so the window closes
        let ttl_secs = match u64::try_from(ttl) {
            Ok(secs) => secs,
            Err(_) => {
                let _: bool = redis::cmd("EXPIRE")
                    .arg(key)
                    .arg(window_secs)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| redis_error(&e))?;
                window_secs
            }
        };

        Ok(WindowHit { count, ttl_secs })
    }

    async fn reset(&self, key: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(&e))?;
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(&e))?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(AppError::external_service("redis", format!("Unexpected PING reply: {pong}")))
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
