// ABOUTME: HTTP middleware: session authentication, CORS, rate limit headers and request tracing
// ABOUTME: Everything here is framework glue around the services in `crate::services`
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Session token extraction and caller resolution
pub mod auth;
/// CORS configuration for browser clients
pub mod cors;
/// Rate limit headers on throttled responses
pub mod rate_limiting;
/// Request IDs and per-request tracing spans
pub mod tracing;

pub use self::tracing::{with_request_tracing, RequestSpan, REQUEST_ID_HEADER};
pub use auth::{authenticate, client_context, extract_session_token};
pub use cors::setup_cors;
pub use rate_limiting::{create_rate_limit_headers, throttled_response, Throttled};
