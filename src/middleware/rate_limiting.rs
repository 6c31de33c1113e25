// ABOUTME: Rate limit response headers for throttled account endpoints
// ABOUTME: Adds X-RateLimit-* and Retry-After to successes and 429 rejections alike
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Rate Limit Headers
//!
//! Throttled services return their value together with the
//! [`RateLimitDecision`] that admitted it. Handlers turn that pair into a
//! response carrying the standard headers.

use account_core::action_result::ActionResult;
use account_core::errors::{AppError, AppResult, ErrorCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderValue};
use serde::Serialize;

use crate::rate_limiting::RateLimitDecision;

/// HTTP header names for rate limiting
pub mod headers {
    /// Attempts allowed in the current window
    pub const X_RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";
    /// Attempts left in the current window
    pub const X_RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
    /// Unix timestamp when the window closes
    pub const X_RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
    /// Seconds to wait before retrying
    pub const RETRY_AFTER: &str = "Retry-After";
}

/// A service result admitted by the rate limiter
#[derive(Debug, Clone)]
pub struct Throttled<T> {
    /// The action's result
    pub value: T,
    /// Limiter state after this attempt
    pub rate_limit: RateLimitDecision,
}

impl<T> Throttled<T> {
    /// Pair `value` with the decision that admitted it
    pub const fn new(value: T, rate_limit: RateLimitDecision) -> Self {
        Self { value, rate_limit }
    }

    /// Transform the value, keeping the decision
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Throttled<U> {
        Throttled {
            value: f(self.value),
            rate_limit: self.rate_limit,
        }
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(name, value);
    }
}

/// Create a `HeaderMap` with rate limit headers
///
/// `Retry-After` is only set once the budget is spent.
#[must_use]
pub fn create_rate_limit_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, headers::X_RATE_LIMIT_LIMIT, decision.limit);
    insert(
        &mut headers,
        headers::X_RATE_LIMIT_REMAINING,
        decision.remaining,
    );
    insert(
        &mut headers,
        headers::X_RATE_LIMIT_RESET,
        decision.reset_at.timestamp(),
    );
    if !decision.allowed {
        insert(
            &mut headers,
            headers::RETRY_AFTER,
            decision.retry_after_secs(),
        );
    }
    headers
}

/// Rebuild rate limit headers from a `RATE_LIMIT_EXCEEDED` error's details
fn headers_from_error(error: &AppError) -> Option<HeaderMap> {
    if error.code != ErrorCode::RateLimitExceeded {
        return None;
    }
    let details = error.details.as_ref()?;
    let limit = details.get("limit")?.as_u64()?;
    let reset_at = details
        .get("resetAt")?
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())?
        .with_timezone(&Utc);
    Some(create_rate_limit_headers(&RateLimitDecision {
        allowed: false,
        limit: u32::try_from(limit).unwrap_or(u32::MAX),
        remaining: 0,
        reset_at,
        degraded: false,
    }))
}

/// Render a throttled action as an `ActionResult` response with rate limit headers
pub fn throttled_response<T: Serialize>(result: AppResult<Throttled<T>>) -> Response {
    match result {
        Ok(throttled) => {
            let headers = create_rate_limit_headers(&throttled.rate_limit);
            (headers, Json(ActionResult::ok(throttled.value))).into_response()
        }
        Err(error) => match headers_from_error(&error) {
            Some(headers) => (headers, error).into_response(),
            None => error.into_response(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn decision(allowed: bool) -> RateLimitDecision {
        RateLimitDecision {
            allowed,
            limit: 5,
            remaining: if allowed { 3 } else { 0 },
            reset_at: Utc::now() + Duration::seconds(90),
            degraded: false,
        }
    }

    #[test]
    fn test_headers_for_allowed_request() {
        let headers = create_rate_limit_headers(&decision(true));
        assert_eq!(headers[headers::X_RATE_LIMIT_LIMIT], "5");
        assert_eq!(headers[headers::X_RATE_LIMIT_REMAINING], "3");
        assert!(headers.contains_key(headers::X_RATE_LIMIT_RESET));
        assert!(!headers.contains_key(headers::RETRY_AFTER));
    }

    #[test]
    fn test_headers_for_rejected_request() {
        let headers = create_rate_limit_headers(&decision(false));
        assert_eq!(headers[headers::X_RATE_LIMIT_REMAINING], "0");
        let retry: i64 = headers[headers::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((0..=90).contains(&retry));
    }

    #[test]
    fn test_rejection_response_carries_headers() {
        let error = AppError::rate_limit_exceeded(5, Utc::now() + Duration::seconds(60), 60);
        let response = throttled_response::<()>(Err(error));
        assert_eq!(response.status(), http::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[headers::X_RATE_LIMIT_LIMIT], "5");
        assert!(response.headers().contains_key(headers::RETRY_AFTER));
    }

    #[test]
    fn test_success_response_carries_headers() {
        let response = throttled_response(Ok(Throttled::new("ok", decision(true))));
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(response.headers()[headers::X_RATE_LIMIT_REMAINING], "3");
    }
}
