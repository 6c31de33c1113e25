// ABOUTME: Signed session tokens (HS256 JWT) referencing server-side session rows
// ABOUTME: Issues tokens at sign-in and validates signature, issuer and expiry on each request
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Session Tokens
//!
//! A token only proves that the server issued it. Whether the session is
//! still alive is decided by the `sessions` row named in the `sid` claim, so
//! sign-out, password reset and account deletion revoke tokens immediately.

use std::fmt;

use account_core::constants::sessions::JWT_ISSUER;
use account_core::errors::{AppError, AppResult};
use account_core::models::{Session, User, UserRole};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token has expired
    TokenExpired {
        /// When the token expired
        expired_at: DateTime<Utc>,
    },
    /// Token signature or claims are invalid
    TokenInvalid {
        /// Reason for invalidity
        reason: String,
    },
    /// Token is not a well-formed JWT
    TokenMalformed {
        /// Details about malformation
        details: String,
    },
}

impl fmt::Display for JwtValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenExpired { expired_at } => write!(
                f,
                "Session token expired at {}",
                expired_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            Self::TokenInvalid { reason } => write!(f, "Session token is invalid: {reason}"),
            Self::TokenMalformed { details } => write!(f, "Session token is malformed: {details}"),
        }
    }
}

impl std::error::Error for JwtValidationError {}

impl From<JwtValidationError> for AppError {
    fn from(error: JwtValidationError) -> Self {
        match error {
            JwtValidationError::TokenExpired { .. } => Self::auth_expired(),
            other => Self::auth_invalid(other.to_string()),
        }
    }
}

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Session ID
    pub sid: String,
    /// Role at issue time (informational; authorization reloads the user)
    pub role: UserRole,
    /// Issuer
    pub iss: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

impl Claims {
    /// Parsed user ID
    ///
    /// # Errors
    ///
    /// Returns an auth error if `sub` is not a UUID
    pub fn user_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::auth_invalid("Malformed subject claim"))
    }

    /// Parsed session ID
    ///
    /// # Errors
    ///
    /// Returns an auth error if `sid` is not a UUID
    pub fn session_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sid).map_err(|_| AppError::auth_invalid("Malformed session claim"))
    }
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct AuthManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthManager").finish_non_exhaustive()
    }
}

impl AuthManager {
    /// Create a manager signing with `secret`
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a token for `session`
    ///
    /// # Errors
    ///
    /// Returns an internal error if signing fails
    pub fn generate_token(&self, user: &User, session: &Session) -> AppResult<String> {
        let claims = Claims {
            sub: user.id.to_string(),
            sid: session.id.to_string(),
            role: user.role,
            iss: JWT_ISSUER.to_owned(),
            iat: session.created_at.timestamp(),
            exp: session.expires_at.timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign session token: {e}")))
    }

    /// Validate signature, issuer and expiry of `token`
    ///
    /// # Errors
    ///
    /// Returns a [`JwtValidationError`] describing why the token was rejected
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[JWT_ISSUER]);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| self.convert_jwt_error(token, &e))
    }

    fn convert_jwt_error(
        &self,
        token: &str,
        e: &jsonwebtoken::errors::Error,
    ) -> JwtValidationError {
        tracing::debug!("Session token validation failed: {e:?}");
        match e.kind() {
            ErrorKind::ExpiredSignature => JwtValidationError::TokenExpired {
                expired_at: self.expired_at(token).unwrap_or_else(Utc::now),
            },
            ErrorKind::InvalidSignature => JwtValidationError::TokenInvalid {
                reason: "Token signature verification failed".into(),
            },
            ErrorKind::InvalidIssuer => JwtValidationError::TokenInvalid {
                reason: "Token was not issued by this server".into(),
            },
            ErrorKind::InvalidToken => JwtValidationError::TokenMalformed {
                details: "Token format is invalid".into(),
            },
            ErrorKind::Base64(err) => JwtValidationError::TokenMalformed {
                details: format!("Token contains invalid base64: {err}"),
            },
            ErrorKind::Json(err) => JwtValidationError::TokenMalformed {
                details: format!("Token contains invalid JSON: {err}"),
            },
            _ => JwtValidationError::TokenInvalid {
                reason: format!("Token validation failed: {e}"),
            },
        }
    }

    /// Read `exp` from a token whose signature is valid but which has expired
    fn expired_at(&self, token: &str) -> Option<DateTime<Utc>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_issuer(&[JWT_ISSUER]);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .ok()
            .and_then(|data| Utc.timestamp_opt(data.claims.exp, 0).single())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn manager() -> AuthManager {
        AuthManager::new(b"test-secret-that-is-long-enough-for-hs256")
    }

    fn user() -> User {
        User::new("jwt@example.com".into(), None, None)
    }

    #[test]
    fn test_round_trip_claims() {
        let user = user();
        let session = Session::new(user.id, Duration::hours(1), None, None);
        let token = manager().generate_token(&user, &session).unwrap();

        let claims = manager().validate_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.session_id().unwrap(), session.id);
        assert_eq!(claims.role, UserRole::User);
    }

    #[test]
    fn test_expired_token_rejected() {
        let user = user();
        let mut session = Session::new(user.id, Duration::hours(1), None, None);
        session.created_at = Utc::now() - Duration::hours(2);
        session.expires_at = Utc::now() - Duration::hours(1);
        let token = manager().generate_token(&user, &session).unwrap();

        let err = manager().validate_token(&token).unwrap_err();
        assert!(matches!(err, JwtValidationError::TokenExpired { .. }));
        assert_eq!(
            AppError::from(err).code,
            account_core::errors::ErrorCode::AuthExpired
        );
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let user = user();
        let session = Session::new(user.id, Duration::hours(1), None, None);
        let token = AuthManager::new(b"another-secret-another-secret-another")
            .generate_token(&user, &session)
            .unwrap();
        assert!(matches!(
            manager().validate_token(&token),
            Err(JwtValidationError::TokenInvalid { .. })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            manager().validate_token("not-a-jwt"),
            Err(JwtValidationError::TokenMalformed { .. })
        ));
    }
}
