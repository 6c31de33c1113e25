// ABOUTME: Session authentication for route handlers
// ABOUTME: Reads the session cookie or a Bearer token and resolves the calling account
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use account_core::constants::sessions::SESSION_COOKIE_NAME;
use account_core::errors::{AppError, AppResult};
use http::{header, HeaderMap};

use crate::resources::ServerResources;
use crate::security::cookies::extract_cookie;
use crate::services::{AuthService, AuthenticatedUser, ClientContext};

/// Session token carried by the request
///
/// The httpOnly cookie set at login is preferred; API clients may send the
/// same token as `Authorization: Bearer <token>`.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie(headers, SESSION_COOKIE_NAME).or_else(|| bearer_token(headers))
}

/// Token of an `Authorization: Bearer` header
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
}

/// Resolve the caller of a request
///
/// # Errors
///
/// Returns `AUTH_REQUIRED` when no token is present, otherwise whatever
/// [`AuthService::authenticate`] rejects the token with
#[tracing::instrument(skip_all, fields(user_id = tracing::field::Empty))]
pub async fn authenticate(
    headers: &HeaderMap,
    resources: &std::sync::Arc<ServerResources>,
) -> AppResult<AuthenticatedUser> {
    let token = extract_session_token(headers).ok_or_else(AppError::auth_required)?;
    let caller = AuthService::new(resources.clone())
        .authenticate(&token)
        .await?;
    tracing::Span::current().record("user_id", caller.user.id.to_string());
    Ok(caller)
}

/// Client address and user agent as seen through the reverse proxy
#[must_use]
pub fn client_context(headers: &HeaderMap) -> ClientContext {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned);

    ClientContext {
        ip: forwarded
            .or(real_ip)
            .map_or_else(|| ClientContext::unknown().ip, ToOwned::to_owned),
        user_agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_cookie_preferred_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_token=from-cookie"),
        );
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("from-cookie")
        );

        headers.remove(header::COOKIE);
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn test_non_bearer_authorization_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert!(extract_session_token(&headers).is_none());
    }

    #[test]
    fn test_client_ip_from_proxy_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_context(&headers).ip, ClientContext::unknown().ip);

        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_context(&headers).ip, "10.0.0.9");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));
        let client = client_context(&headers);
        assert_eq!(client.ip, "203.0.113.7");
        assert_eq!(client.user_agent.as_deref(), Some("curl/8.0"));
    }
}
