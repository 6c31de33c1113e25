// ABOUTME: Operator command line for account maintenance outside the HTTP API
// ABOUTME: Runs the anonymization job once and manages administrator accounts
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Usage:
//! ```bash
//! # Anonymize accounts whose grace period has ended (prints the JSON summary)
//! account-admin cleanup-deleted-accounts
//!
//! # Grant the admin role to an existing account
//! account-admin promote --email ops@example.com
//!
//! # Create a verified admin account
//! account-admin create-admin --email ops@example.com --password 'correct horse battery'
//! ```

use std::sync::Arc;

use account_server::config::{DatabaseUrl, ServerConfig};
use account_server::resources::ServerResources;
use account_server::services::{AdminService, CleanupService};
use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "account-admin",
    about = "Account server maintenance",
    long_about = "Maintenance commands for the account server. Reads the same environment as the server."
)]
struct AdminArgs {
    #[command(subcommand)]
    command: AdminCommand,

    /// Database URL override
    #[arg(long)]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Anonymize soft-deleted accounts past the grace period
    CleanupDeletedAccounts,

    /// Give an existing account the admin role
    Promote {
        /// Account email
        #[arg(long)]
        email: String,
    },

    /// Create a verified account with the admin role
    CreateAdmin {
        /// Admin email
        #[arg(long)]
        email: String,

        /// Admin password
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AdminArgs::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))?;

    let mut config = ServerConfig::from_env()?;
    if let Some(url) = args.database_url {
        config.database.url = DatabaseUrl::parse_url(&url)?;
    }
    let resources = Arc::new(ServerResources::from_config(config).await?);

    match args.command {
        AdminCommand::CleanupDeletedAccounts => {
            let summary = CleanupService::new(resources)
                .cleanup_deleted_accounts(Utc::now())
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        AdminCommand::Promote { email } => {
            let user = AdminService::new(resources).promote(&email).await?;
            info!("Granted admin role to {}", user.email);
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        AdminCommand::CreateAdmin { email, password } => {
            let user = AdminService::new(resources)
                .create_admin(&email, &password)
                .await?;
            info!("Created admin account {}", user.email);
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
    }
    Ok(())
}
