// ABOUTME: Security utilities: password hashing, one-time tokens, session cookies and response headers
// ABOUTME: Hardening headers are applied to every API response as tower layers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Security
//!
//! The API only serves JSON, so the header set is the strict one: nothing may
//! frame, sniff or embed a response.

/// Session cookie construction and parsing
pub mod cookies;
/// bcrypt password hashing off the async executor
pub mod passwords;
/// Random one-time tokens and their stored digests
pub mod tokens;

use axum::Router;
use http::{header, HeaderName, HeaderValue};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::Environment;

/// Security headers configuration
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    /// Content Security Policy header value
    pub csp: &'static str,
    /// X-Frame-Options header value
    pub frame_options: &'static str,
    /// Referrer-Policy header value
    pub referrer_policy: &'static str,
    /// Strict-Transport-Security header value (for HTTPS)
    pub hsts: Option<&'static str>,
}

impl SecurityHeaders {
    /// Header set for the given environment; HSTS only in production
    #[must_use]
    pub const fn for_environment(environment: Environment) -> Self {
        Self {
            csp: "default-src 'none'; frame-ancestors 'none'; base-uri 'none'",
            frame_options: "DENY",
            referrer_policy: "no-referrer",
            hsts: if environment.is_production() {
                Some("max-age=31536000; includeSubDomains")
            } else {
                None
            },
        }
    }

    fn pairs(&self) -> Vec<(HeaderName, &'static str)> {
        let mut pairs = vec![
            (header::CONTENT_SECURITY_POLICY, self.csp),
            (header::X_FRAME_OPTIONS, self.frame_options),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::REFERRER_POLICY, self.referrer_policy),
            (header::CACHE_CONTROL, "no-store"),
        ];
        if let Some(hsts) = self.hsts {
            pairs.push((header::STRICT_TRANSPORT_SECURITY, hsts));
        }
        pairs
    }

    /// Add the headers to every response of `router` unless a handler already set them
    #[must_use]
    pub fn apply<S: Clone + Send + Sync + 'static>(&self, router: Router<S>) -> Router<S> {
        self.pairs()
            .into_iter()
            .fold(router, |router, (name, value)| {
                router.layer(SetResponseHeaderLayer::if_not_present(
                    name,
                    HeaderValue::from_static(value),
                ))
            })
    }
}
