// ABOUTME: Email provider that writes messages to the log instead of sending them
// ABOUTME: Default when no Resend API key is configured
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use account_core::errors::AppResult;
use async_trait::async_trait;
use tracing::info;

use super::{EmailMessage, EmailProvider};
use crate::logging::mask_email;

/// Logs each message, including its text body so links can be followed locally
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleProvider;

#[async_trait]
impl EmailProvider for ConsoleProvider {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        info!(
            email.to = %mask_email(&message.to),
            email.template = message.template,
            email.subject = %message.subject,
            "Email not sent (console provider):\n{}",
            message.text
        );
        Ok(())
    }
}
