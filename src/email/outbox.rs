// ABOUTME: Email provider that keeps sent messages in memory
// ABOUTME: Lets tests and tooling read verification links without an email server
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use account_core::errors::AppResult;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EmailMessage, EmailProvider};

/// Collects every message it is asked to send
#[derive(Debug, Default)]
pub struct OutboxProvider {
    messages: Mutex<Vec<EmailMessage>>,
}

impl OutboxProvider {
    /// Messages sent so far, oldest first
    pub async fn messages(&self) -> Vec<EmailMessage> {
        self.messages.lock().await.clone()
    }

    /// Most recent message to `to` rendered from `template`
    pub async fn last_to(&self, to: &str, template: &str) -> Option<EmailMessage> {
        self.messages
            .lock()
            .await
            .iter()
            .rev()
            .find(|m| m.to == to && m.template == template)
            .cloned()
    }

    /// Drop every stored message
    pub async fn clear(&self) {
        self.messages.lock().await.clear();
    }
}

/// Value of the `token` query parameter in the first link of `text`
#[must_use]
pub fn extract_token(text: &str) -> Option<String> {
    text.split_whitespace()
        .filter_map(|word| url::Url::parse(word).ok())
        .find_map(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
        })
}

#[async_trait]
impl EmailProvider for OutboxProvider {
    fn name(&self) -> &'static str {
        "outbox"
    }

    async fn send(&self, message: &EmailMessage) -> AppResult<()> {
        self.messages.lock().await.push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token() {
        let text = "Reset your password:\nhttps://app.example.com/reset-password?token=abc_DEF-1\n";
        assert_eq!(extract_token(text).as_deref(), Some("abc_DEF-1"));
        assert_eq!(extract_token("no links here"), None);
    }
}
