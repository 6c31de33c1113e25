// ABOUTME: Transactional email for verification links and account lifecycle notices
// ABOUTME: Provider trait with Resend, console and in-memory outbox implementations
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Email
//!
//! Account actions never fail because an email could not be delivered.
//! [`EmailService::send_or_log`] records the failure and carries on; the
//! action's own database changes have already been committed.

/// Console provider for development
pub mod console;
/// In-memory outbox for tests and local tooling
pub mod outbox;
/// Resend HTTP API provider
pub mod resend;
/// Subject and body rendering per template
pub mod templates;

use std::sync::Arc;

use account_core::errors::AppResult;
use async_trait::async_trait;
use url::Url;

use crate::config::EmailConfig;
use crate::logging::AppLogger;

pub use console::ConsoleProvider;
pub use outbox::OutboxProvider;
pub use resend::ResendProvider;
pub use templates::EmailTemplate;

/// Rendered message ready for a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text: String,
    /// HTML body
    pub html: String,
    /// Template name, for logs
    pub template: &'static str,
}

/// Delivery backend
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Deliver one message
    async fn send(&self, message: &EmailMessage) -> AppResult<()>;
}

/// Renders templates and hands them to the configured provider
#[derive(Clone)]
pub struct EmailService {
    provider: Arc<dyn EmailProvider>,
    app_url: Url,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("provider", &self.provider.name())
            .field("app_url", &self.app_url.as_str())
            .finish()
    }
}

impl EmailService {
    /// Service over an explicit provider
    #[must_use]
    pub fn new(provider: Arc<dyn EmailProvider>, app_url: Url) -> Self {
        Self { provider, app_url }
    }

    /// Resend when an API key is configured, console output otherwise
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the Resend client cannot be built
    pub fn from_config(config: &EmailConfig, app_url: Url) -> AppResult<Self> {
        let provider: Arc<dyn EmailProvider> = match &config.resend_api_key {
            Some(key) => Arc::new(ResendProvider::new(
                key.clone(),
                &config.resend_api_url,
                config.from_address.clone(),
            )?),
            None => Arc::new(ConsoleProvider),
        };
        tracing::info!(provider = provider.name(), "Email service initialized");
        Ok(Self::new(provider, app_url))
    }

    /// Absolute URL of an app page carrying `token` as a query parameter
    #[must_use]
    pub fn link(&self, path: &str, token: &str) -> String {
        let mut url = self.app_url.clone();
        url.set_path(path);
        url.query_pairs_mut().clear().append_pair("token", token);
        url.into()
    }

    /// Absolute URL of an app page
    #[must_use]
    pub fn page(&self, path: &str) -> String {
        let mut url = self.app_url.clone();
        url.set_path(path);
        url.set_query(None);
        url.into()
    }

    /// Render and deliver `template` to `to`
    ///
    /// # Errors
    ///
    /// Returns the provider's error
    pub async fn send(&self, to: &str, template: &EmailTemplate) -> AppResult<()> {
        let message = template.render(to);
        self.provider.send(&message).await?;
        AppLogger::log_email_event(message.template, to, true, None);
        Ok(())
    }

    /// Deliver `template`, logging and swallowing any failure; returns whether it was sent
    pub async fn send_or_log(&self, to: &str, template: &EmailTemplate) -> bool {
        match self.send(to, template).await {
            Ok(()) => true,
            Err(e) => {
                AppLogger::log_email_event(template.name(), to, false, Some(&e.message));
                false
            }
        }
    }
}
