// ABOUTME: Registration, password sign-in, sign-out and email verification
// ABOUTME: Resolves session tokens to live sessions for every authenticated request
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use account_core::constants::{messages, routes};
use account_core::errors::{AppError, AppResult};
use account_core::models::{AccountState, PublicUser, Session, SessionView, TokenPurpose, User};
use chrono::Utc;
use tracing::info;

use super::types::{
    AuthenticatedUser, ClientContext, LoginRequest, LoginResponse, MessageResponse,
    RegisterRequest, RegisterResponse, SessionResponse, TokenRequest,
};
use super::{consume_token, issue_token};
use crate::database_plugins::DatabaseProvider;
use crate::email::EmailTemplate;
use crate::logging::AppLogger;
use crate::middleware::rate_limiting::Throttled;
use crate::rate_limiting::{ip_and_email, RateLimitAction};
use crate::resources::ServerResources;
use crate::security::passwords::{hash_password, verify_password};
use crate::validation::{normalize_email, validate_request};

/// Sign-up, sign-in and session resolution
#[derive(Clone)]
pub struct AuthService {
    resources: Arc<ServerResources>,
}

impl AuthService {
    /// Service over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Create an account and email a verification link
    ///
    /// # Errors
    ///
    /// Returns a validation error, `RATE_LIMIT_EXCEEDED` (per IP), or
    /// `RESOURCE_ALREADY_EXISTS` when the email or username is taken
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: &ClientContext,
    ) -> AppResult<Throttled<RegisterResponse>> {
        validate_request(&request)?;
        let decision = self
            .resources
            .rate_limiter
            .enforce(RateLimitAction::Register, &client.ip)
            .await?;

        let database = &self.resources.database;
        let email = normalize_email(&request.email);
        if database.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::already_exists("An account with this email already exists")
                .with_field_error("email", "Email is already registered"));
        }
        let username = request.username.map(|u| u.trim().to_owned());
        if let Some(username) = &username {
            if database.get_user_by_username(username).await?.is_some() {
                return Err(AppError::already_exists("This username is already taken")
                    .with_field_error("username", "Username is already taken"));
            }
        }

        let password_hash = hash_password(&request.password, self.resources.bcrypt_cost()).await?;
        let name = request
            .name
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());
        let mut user = User::new(email, Some(password_hash), name);
        user.username = username;
        database.create_user(&user).await?;

        self.send_verification(&user).await?;
        AppLogger::log_auth_event(Some(user.id), "register", true, None);

        Ok(Throttled::new(
            RegisterResponse {
                user: PublicUser::from(&user),
                message: "Account created. Check your email to verify your address.".to_owned(),
            },
            decision,
        ))
    }

    /// Sign in with email and password, creating a session
    ///
    /// Unknown email, wrong password and accounts without a password all
    /// produce the same `AUTH_INVALID` message.
    ///
    /// # Errors
    ///
    /// Returns `AUTH_INVALID`, `RATE_LIMIT_EXCEEDED` (per IP and email), or
    /// `ACCOUNT_DELETED` with the restore deadline for soft-deleted accounts
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientContext,
    ) -> AppResult<Throttled<LoginResponse>> {
        validate_request(&request)?;
        let email = normalize_email(&request.email);
        let limiter_key = ip_and_email(&client.ip, &email);
        let decision = self
            .resources
            .rate_limiter
            .enforce(RateLimitAction::Login, &limiter_key)
            .await?;

        let database = &self.resources.database;
        let user = database.get_user_by_email(&email).await?;
        let stored_hash = user.as_ref().and_then(|u| u.password_hash.as_deref());
        let valid =
            verify_password(&request.password, stored_hash, self.resources.bcrypt_cost()).await?;

        let user = match user {
            Some(user) if valid => user,
            other => {
                AppLogger::log_auth_event(
                    other.map(|u| u.id),
                    "login",
                    false,
                    Some("invalid credentials"),
                );
                return Err(AppError::auth_invalid(messages::INVALID_CREDENTIALS));
            }
        };

        match user.account_state(self.resources.grace_period(), Utc::now()) {
            AccountState::Active => {}
            AccountState::PendingDeletion {
                restore_deadline, ..
            } => {
                AppLogger::log_auth_event(
                    Some(user.id),
                    "login",
                    false,
                    Some("account pending deletion"),
                );
                return Err(AppError::account_deleted(restore_deadline));
            }
            AccountState::Anonymized => {
                return Err(AppError::auth_invalid(messages::INVALID_CREDENTIALS));
            }
        }

        let session = Session::new(
            user.id,
            self.resources.session_lifetime(),
            Some(client.ip.clone()),
            client.user_agent.clone(),
        );
        database.create_session(&session).await?;
        let token = self.resources.auth_manager.generate_token(&user, &session)?;

        self.resources
            .rate_limiter
            .reset(RateLimitAction::Login, &limiter_key)
            .await;
        AppLogger::log_auth_event(Some(user.id), "login", true, None);

        Ok(Throttled::new(
            LoginResponse {
                user: PublicUser::from(&user),
                token,
                expires_at: session.expires_at,
            },
            decision,
        ))
    }

    /// End the caller's session
    ///
    /// # Errors
    ///
    /// Returns a database error if the session row cannot be deleted
    pub async fn logout(&self, caller: &AuthenticatedUser) -> AppResult<MessageResponse> {
        self.resources
            .database
            .delete_session(caller.session.id)
            .await?;
        AppLogger::log_auth_event(Some(caller.user.id), "logout", true, None);
        Ok(MessageResponse::new("Signed out"))
    }

    /// Resolve a session token to the live session and its account
    ///
    /// # Errors
    ///
    /// Returns `AUTH_INVALID` for bad signatures, revoked sessions or deleted
    /// accounts and `AUTH_EXPIRED` for expired sessions
    pub async fn authenticate(&self, token: &str) -> AppResult<AuthenticatedUser> {
        let claims = self.resources.auth_manager.validate_token(token)?;
        let user_id = claims.user_id()?;
        let database = &self.resources.database;

        let session = database
            .get_session(claims.session_id()?)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| AppError::auth_invalid("Session has been revoked"))?;
        if session.is_expired(Utc::now()) {
            return Err(AppError::auth_expired());
        }

        let user = database
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::auth_invalid("Account no longer exists"))?;
        if user.is_deleted {
            return Err(AppError::auth_invalid("Account is scheduled for deletion"));
        }

        Ok(AuthenticatedUser { user, session })
    }

    /// Current account and session of the caller
    #[must_use]
    pub fn session_info(caller: &AuthenticatedUser) -> SessionResponse {
        SessionResponse {
            user: PublicUser::from(&caller.user),
            session: SessionView::from_session(&caller.session, caller.session.id),
        }
    }

    /// Mark the address verified using an emailed token
    ///
    /// # Errors
    ///
    /// Returns `TOKEN_INVALID` or `TOKEN_EXPIRED` for unusable tokens
    pub async fn verify_email(&self, request: TokenRequest) -> AppResult<MessageResponse> {
        validate_request(&request)?;
        let database = &self.resources.database;
        let record =
            consume_token(database, &request.token, TokenPurpose::EmailVerification).await?;

        let user = database
            .get_user(record.user_id)
            .await?
            .ok_or_else(AppError::token_invalid)?;
        if !user.is_email_verified() {
            database.mark_email_verified(user.id, Utc::now()).await?;
        }
        AppLogger::log_auth_event(Some(user.id), "verify_email", true, None);
        Ok(MessageResponse::new("Email address verified"))
    }

    /// Send a new verification link to the caller
    ///
    /// # Errors
    ///
    /// Returns `RATE_LIMIT_EXCEEDED` (per user) or `INVALID_INPUT` when the
    /// address is already verified
    pub async fn resend_verification(
        &self,
        caller: &AuthenticatedUser,
    ) -> AppResult<Throttled<MessageResponse>> {
        let decision = self
            .resources
            .rate_limiter
            .enforce(
                RateLimitAction::ResendVerification,
                &caller.user.id.to_string(),
            )
            .await?;
        if caller.user.is_email_verified() {
            return Err(AppError::invalid_input("Email address is already verified"));
        }
        self.send_verification(&caller.user).await?;
        Ok(Throttled::new(MessageResponse::new("Verification email sent"), decision))
    }

    async fn send_verification(&self, user: &User) -> AppResult<()> {
        let token = issue_token(
            &self.resources.database,
            user.id,
            TokenPurpose::EmailVerification,
            None,
        )
        .await?;
        let url = self.resources.email.link(routes::VERIFY_EMAIL_PAGE, &token);
        self.resources
            .email
            .send_or_log(&user.email, &EmailTemplate::VerifyEmail { url })
            .await;
        info!(user.id = %user.id, "Verification email issued");
        Ok(())
    }
}
