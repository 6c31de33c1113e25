// ABOUTME: Transaction retry with exponential backoff for transient lock and deadlock errors
// ABOUTME: Used around the multi-statement anonymization transaction in both backends
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::future::Future;
use std::time::Duration;

use account_core::errors::AppResult;
use tokio::time::sleep;
use tracing::warn;

/// Attempts made for a transaction before giving up
pub const DEFAULT_TRANSACTION_ATTEMPTS: u32 = 3;

/// Retry a transaction operation if it fails due to deadlock, lock contention or timeout
///
/// Backoff doubles from 20ms. Non-retryable errors (constraint violations,
/// missing rows) are returned immediately.
///
/// # Errors
///
/// Returns the last error once `max_attempts` is reached or a non-retryable error occurs
pub async fn retry_transaction<F, Fut, T>(mut f: F, max_attempts: u32) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempts = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempts += 1;
                if attempts >= max_attempts || !is_retryable_error(&e.message) {
                    return Err(e);
                }
                let backoff_ms = 10 * (1_u64 << attempts);
                warn!(
                    attempt = attempts,
                    max_attempts = max_attempts,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Transaction failed with retryable error, retrying after backoff"
                );
                sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}

/// Whether an error message describes a transient condition
///
/// `SQLite` reports "database is locked"/"busy"; `PostgreSQL` reports
/// deadlocks and serialization failures.
fn is_retryable_error(error_msg: &str) -> bool {
    let error_lower = error_msg.to_lowercase();
    if error_lower.contains("unique constraint")
        || error_lower.contains("foreign key constraint")
        || error_lower.contains("permission denied")
    {
        return false;
    }
    error_lower.contains("deadlock")
        || error_lower.contains("database is locked")
        || error_lower.contains("busy")
        || error_lower.contains("timed out")
        || error_lower.contains("timeout")
        || error_lower.contains("could not serialize")
        || error_lower.contains("serialization failure")
}

#[cfg(test)]
mod tests {
    use super::*;
    use account_core::errors::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable_error("Database error: database is locked"));
        assert!(is_retryable_error("deadlock detected"));
        assert!(!is_retryable_error("UNIQUE constraint failed: users.email"));
        assert!(!is_retryable_error("no rows returned"));
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = retry_transaction(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AppError::database("database is locked"))
                } else {
                    Ok(7)
                }
            },
            3,
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = retry_transaction(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::not_found("User"))
            },
            3,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
