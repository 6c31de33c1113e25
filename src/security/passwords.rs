// ABOUTME: bcrypt password hashing and verification executed on the blocking thread pool
// ABOUTME: Unknown accounts still pay the hashing cost so response time does not reveal them
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use account_core::errors::{AppError, AppResult};
use tokio::task;

/// Hash `password` with bcrypt at `cost`
///
/// # Errors
///
/// Returns an internal error if hashing fails or the blocking task panics
pub async fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_owned();
    task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::internal(format!("Password hashing task failed: {e}")))?
        .map_err(|e| AppError::internal(format!("Password hashing failed: {e}")))
}

/// Check `password` against a stored bcrypt hash
///
/// When there is no stored hash (unknown email, passwordless account) a hash is
/// computed anyway and `false` is returned, keeping timing uniform.
///
/// # Errors
///
/// Returns an internal error if the blocking task panics
pub async fn verify_password(
    password: &str,
    stored_hash: Option<&str>,
    cost: u32,
) -> AppResult<bool> {
    let password = password.to_owned();
    let stored_hash = stored_hash.map(ToOwned::to_owned);
    task::spawn_blocking(move || match stored_hash {
        Some(hash) => bcrypt::verify(password, &hash).unwrap_or(false),
        None => {
            let _ = bcrypt::hash(password, cost);
            false
        }
    })
    .await
    .map_err(|e| AppError::internal(format!("Password verification task failed: {e}")))
}
