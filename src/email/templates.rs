// ABOUTME: Subject lines and bodies for every transactional email
// ABOUTME: Each template renders to both plain text and minimal escaped HTML
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use chrono::{DateTime, Utc};

use super::EmailMessage;

/// Email the account service can send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailTemplate {
    /// Confirm ownership of the registered address
    VerifyEmail {
        /// Verification link
        url: String,
    },
    /// Password reset link
    PasswordReset {
        /// Reset link
        url: String,
    },
    /// Notice that the password changed
    PasswordChanged,
    /// Confirmation link sent to the new address
    EmailChangeConfirm {
        /// Confirmation link
        url: String,
        /// Address being confirmed
        new_email: String,
    },
    /// Notice sent to the old address when a change is requested
    EmailChangeNotice {
        /// Address the account is moving to
        new_email: String,
    },
    /// Deletion was scheduled; lists the restore deadline
    DeletionScheduled {
        /// Last instant the account can be restored
        restore_deadline: DateTime<Utc>,
        /// Restore page
        restore_url: String,
    },
    /// Account came back from pending deletion
    AccountRestored,
}

impl EmailTemplate {
    /// Template name used in logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::VerifyEmail { .. } => "verify_email",
            Self::PasswordReset { .. } => "password_reset",
            Self::PasswordChanged => "password_changed",
            Self::EmailChangeConfirm { .. } => "email_change_confirm",
            Self::EmailChangeNotice { .. } => "email_change_notice",
            Self::DeletionScheduled { .. } => "deletion_scheduled",
            Self::AccountRestored => "account_restored",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            Self::VerifyEmail { .. } => "Verify your email address",
            Self::PasswordReset { .. } => "Reset your password",
            Self::PasswordChanged => "Your password was changed",
            Self::EmailChangeConfirm { .. } => "Confirm your new email address",
            Self::EmailChangeNotice { .. } => "A change of your email address was requested",
            Self::DeletionScheduled { .. } => "Your account is scheduled for deletion",
            Self::AccountRestored => "Your account was restored",
        }
    }

    /// Paragraphs of the body and an optional call-to-action link
    fn body(&self) -> (Vec<String>, Option<&str>) {
        match self {
            Self::VerifyEmail { url } => (
                vec!["Confirm this address to finish setting up your account. The link expires in 24 hours.".into()],
                Some(url),
            ),
            Self::PasswordReset { url } => (
                vec![
                    "Someone asked to reset the password for this account. The link expires in 1 hour.".into(),
                    "If it was not you, ignore this email and your password stays the same.".into(),
                ],
                Some(url),
            ),
            Self::PasswordChanged => (
                vec![
                    "The password for your account was just changed and other devices were signed out.".into(),
                    "If you did not do this, reset your password immediately.".into(),
                ],
                None,
            ),
            Self::EmailChangeConfirm { url, new_email } => (
                vec![format!(
                    "Confirm that {new_email} should become the sign-in address for your account. The link expires in 24 hours."
                )],
                Some(url),
            ),
            Self::EmailChangeNotice { new_email } => (
                vec![
                    format!("Someone asked to move your account to {new_email}. Nothing changes until the new address is confirmed."),
                    "If you did not do this, change your password right away.".into(),
                ],
                None,
            ),
            Self::DeletionScheduled {
                restore_deadline,
                restore_url,
            } => (
                vec![
                    format!(
                        "Your account will be permanently deleted after {}.",
                        restore_deadline.format("%B %-d, %Y %H:%M UTC")
                    ),
                    "Until then you can restore it by signing in on the restore page.".into(),
                ],
                Some(restore_url),
            ),
            Self::AccountRestored => (
                vec!["Your account was restored and is no longer scheduled for deletion.".into()],
                None,
            ),
        }
    }

    /// Render for delivery to `to`
    #[must_use]
    pub fn render(&self, to: &str) -> EmailMessage {
        let (paragraphs, link) = self.body();

        let mut text = paragraphs.join("\n\n");
        let mut html = paragraphs
            .iter()
            .map(|p| format!("<p>{}</p>", escape_html(p)))
            .collect::<String>();
        if let Some(link) = link {
            text.push_str("\n\n");
            text.push_str(link);
            text.push('\n');
            let link = escape_html(link);
            html.push_str(&format!("<p><a href=\"{link}\">{link}</a></p>"));
        }

        EmailMessage {
            to: to.to_owned(),
            subject: self.subject().to_owned(),
            text,
            html,
            template: self.name(),
        }
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
