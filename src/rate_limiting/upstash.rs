// ABOUTME: Upstash Redis rate limit counters over the REST API
// ABOUTME: Sends INCR, EXPIRE NX and TTL as one multi-exec transaction per attempt
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::time::Duration;

use account_core::errors::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{RateLimitStore, WindowHit};
use crate::config::RedisConnectionConfig;

/// One entry of an Upstash pipeline or transaction reply
#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Fixed-window counters stored in Upstash Redis
#[derive(Clone)]
pub struct UpstashRestStore {
    client: Client,
    base_url: String,
    token: String,
}

impl UpstashRestStore {
    /// Client for the REST endpoint at `url`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL is not http(s) or the HTTP client cannot be built
    pub fn new(url: &str, token: &str, conn_config: &RedisConnectionConfig) -> AppResult<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| AppError::config(format!("Invalid UPSTASH_REDIS_REST_URL: {e}")))?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            return Err(AppError::config("UPSTASH_REDIS_REST_URL must be an http(s) URL"));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(conn_config.connection_timeout_secs))
            .timeout(Duration::from_millis(
                conn_config.response_timeout_ms + conn_config.connection_timeout_secs * 1000,
            ))
            .build()
            .map_err(|e| AppError::config(format!("Failed to build Upstash HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> AppResult<Value> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::external_service("upstash", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::external_service("upstash", format!("HTTP {status}: {text}")));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::external_service("upstash", format!("Invalid reply: {e}")))
    }

    async fn transaction(&self, commands: Value) -> AppResult<Vec<Value>> {
        let reply = self.post("/multi-exec", &commands).await?;
        let replies: Vec<CommandReply> = serde_json::from_value(reply)
            .map_err(|e| AppError::external_service("upstash", format!("Invalid reply: {e}")))?;
        replies
            .into_iter()
            .map(|reply| match reply.error {
                Some(error) => Err(AppError::external_service("upstash", error)),
                None => Ok(reply.result),
            })
            .collect()
    }
}

fn as_i64(value: &Value) -> AppResult<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| {
            AppError::external_service("upstash", format!("Expected integer, got {value}"))
        })
}

#[async_trait]
impl RateLimitStore for UpstashRestStore {
    async fn hit(&self, key: &str, window: Duration) -> AppResult<WindowHit> {
        let window_secs = window.as_secs().max(1);
        let results = self
            .transaction(json!([
                ["INCR", key],
                ["EXPIRE", key, window_secs.to_string(), "NX"],
                ["TTL", key],
            ]))
            .await?;

        let [count, _, ttl] = results.as_slice() else {
            return Err(AppError::external_service(
                "upstash",
                format!("Expected 3 replies, got {}", results.len()),
            ));
        };
        let count = u64::try_from(as_i64(count)?).unwrap_or(0);
        let ttl_secs = match u64::try_from(as_i64(ttl)?) {
            Ok(secs) => secs,
            Err(_) => {
                self.post("/", &json!(["EXPIRE", key, window_secs.to_string()]))
                    .await?;
                window_secs
            }
        };
        Ok(WindowHit { count, ttl_secs })
    }

    async fn reset(&self, key: &str) -> AppResult<()> {
        self.post("/", &json!(["DEL", key])).await?;
        Ok(())
    }

    async fn health_check(&self) -> AppResult<()> {
        let reply = self.post("/", &json!(["PING"])).await?;
        match reply.get("result").and_then(Value::as_str) {
            Some("PONG") => Ok(()),
            _ => Err(AppError::external_service(
                "upstash",
                format!("Unexpected PING reply: {reply}"),
            )),
        }
    }

    fn backend_name(&self) -> &'static str {
        "upstash-rest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_url() {
        let result = UpstashRestStore::new(
            "redis://localhost:6379",
            "token",
            &RedisConnectionConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_trims_trailing_slash() {
        let store = UpstashRestStore::new(
            "https://eu1-example.upstash.io/",
            "token",
            &RedisConnectionConfig::default(),
        )
        .unwrap();
        assert_eq!(store.base_url, "https://eu1-example.upstash.io");
    }

    #[test]
    fn test_integer_replies_accept_strings() {
        assert_eq!(as_i64(&json!(3)).unwrap(), 3);
        assert_eq!(as_i64(&json!("42")).unwrap(), 42);
        assert!(as_i64(&json!(null)).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_errors() {
        let config = RedisConnectionConfig {
            connection_timeout_secs: 1,
            response_timeout_ms: 100,
            ..RedisConnectionConfig::default()
        };
        let store = UpstashRestStore::new("http://127.0.0.1:9", "token", &config).unwrap();
        assert!(store.hit("k", Duration::from_secs(60)).await.is_err());
    }
}
