// ABOUTME: Shared database logic for PostgreSQL and SQLite implementations
// ABOUTME: Row mappers, SQL statements and transaction retry used by both backends
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Model <-> SQL row conversion helpers
pub mod mappers;

/// Data statements; both backends accept `$N` placeholders
pub mod queries;

/// Transaction retry with exponential backoff
pub mod transactions;
