// ABOUTME: Daily job that anonymizes accounts whose deletion grace period has ended
// ABOUTME: One transaction per account; a failure is recorded and the run continues
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Deleted account cleanup
//!
//! Candidates are soft-deleted accounts with `deleted_at` at or before
//! `now - grace_period` that have not been anonymized yet. Anonymization
//! replaces the email with an undeliverable placeholder, clears every other
//! personal field and removes sessions, linked accounts, tokens and
//! notifications. The row itself stays so foreign references remain valid.
//!
//! The same run also purges expired sessions and verification tokens.

use std::sync::Arc;
use std::time::Instant;

use account_core::errors::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database_plugins::DatabaseProvider;
use crate::logging::AppLogger;
use crate::resources::ServerResources;

/// Account that could not be anonymized in this run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupError {
    /// Account ID
    pub user_id: Uuid,
    /// What went wrong
    pub error: String,
}

/// Outcome of one cleanup run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupSummary {
    /// The run completed (individual accounts may still have failed)
    pub success: bool,
    /// Accounts anonymized
    pub deleted_count: usize,
    /// Accounts that failed, to be retried on the next run
    pub errors: Vec<CleanupError>,
    /// Human-readable summary
    pub message: String,
}

/// Runs the anonymization job
#[derive(Clone)]
pub struct CleanupService {
    resources: Arc<ServerResources>,
}

impl CleanupService {
    /// Service over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Anonymize every account whose grace period ended before `now`
    ///
    /// # Errors
    ///
    /// Returns an error only when the candidate list cannot be read;
    /// per-account failures are reported in [`CleanupSummary::errors`]
    pub async fn cleanup_deleted_accounts(&self, now: DateTime<Utc>) -> AppResult<CleanupSummary> {
        let started = Instant::now();
        let database = &self.resources.database;
        let cutoff = now - self.resources.grace_period();

        let candidates = database.list_users_pending_anonymization(cutoff).await?;
        info!(
            candidates = candidates.len(),
            cutoff = %cutoff.to_rfc3339(),
            "Starting deleted account cleanup"
        );

        let mut deleted_count = 0;
        let mut errors = Vec::new();
        for user_id in candidates {
            match database.anonymize_user(user_id, now).await {
                Ok(()) => {
                    deleted_count += 1;
                    AppLogger::log_lifecycle_event(user_id, "anonymized", None);
                }
                Err(e) => {
                    warn!(user.id = %user_id, "Failed to anonymize account: {}", e.message);
                    errors.push(CleanupError {
                        user_id,
                        error: e.public_message().to_owned(),
                    });
                }
            }
        }

        self.purge_expired(now).await;

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        AppLogger::log_cleanup_summary(deleted_count, errors.len(), elapsed_ms);

        let message = if errors.is_empty() {
            format!("Anonymized {deleted_count} deleted account(s)")
        } else {
            format!(
                "Anonymized {deleted_count} deleted account(s); {} failed",
                errors.len()
            )
        };
        Ok(CleanupSummary {
            success: true,
            deleted_count,
            errors,
            message,
        })
    }

    async fn purge_expired(&self, now: DateTime<Utc>) {
        let database = &self.resources.database;
        match database.purge_expired_sessions(now).await {
            Ok(purged) => info!(purged, "Purged expired sessions"),
            Err(e) => warn!("Failed to purge expired sessions: {}", e.message),
        }
        match database.purge_expired_verification_tokens(now).await {
            Ok(purged) => info!(purged, "Purged expired verification tokens"),
            Err(e) => warn!("Failed to purge expired verification tokens: {}", e.message),
        }
    }
}
