// ABOUTME: Core types and constants for the account lifecycle server
// ABOUTME: Foundation crate with error handling, domain models, permissions and constants
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # Account Core
//!
//! Foundation crate providing shared types for the account lifecycle server.
//! Everything here is free of I/O so the server crate, the admin CLI and the
//! tests agree on a single definition of users, tokens and permissions.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError`, `ErrorCode` and the `ActionResult` envelope
//! - **constants**: Lifecycle periods, token lifetimes and rate limit defaults
//! - **models**: User, Session, `VerificationToken`, Notification and `LinkedAccount`
//! - **permissions**: Rule based ability engine (action + subject + ownership)

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Uniform `{ success, data | error }` envelope returned by every account action
pub mod action_result;

/// Application constants organized by domain
pub mod constants;

/// Core data models
pub mod models;

/// Rule based permission system
pub mod permissions;
