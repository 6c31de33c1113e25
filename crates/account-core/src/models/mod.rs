// ABOUTME: Core data models for accounts, sessions, tokens, notifications and linked accounts
// ABOUTME: Re-exports the domain types shared by the server, the admin CLI and tests
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Data Models
//!
//! - `User`: an account, including its soft-delete and anonymization state
//! - `Session`: a server-side session row backing a signed session token
//! - `VerificationToken`: a one-time token for reset, email change or verification links
//! - `Notification`: an in-app notice about account activity
//! - `LinkedAccount`: an external sign-in method attached to a user

mod account;
mod notification;
mod session;
mod user;
mod verification_token;

pub use account::LinkedAccount;
pub use notification::{Notification, NotificationKind};
pub use session::{Session, SessionView};
pub use user::{AccountState, PublicUser, User, UserRole};
pub use verification_token::{TokenPurpose, VerificationToken};
