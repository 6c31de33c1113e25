// ABOUTME: Account server binary: loads configuration, connects backends and serves the HTTP API
// ABOUTME: Shuts down gracefully on Ctrl-C or SIGTERM
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Account Server Binary
//!
//! ```bash
//! DATABASE_URL=sqlite:./data/accounts.db AUTH_SECRET=... account-server --http-port 8080
//! ```

use std::sync::Arc;

use account_server::{config::ServerConfig, logging, resources::ServerResources, server};
use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "account-server")]
#[command(about = "Account lifecycle API server")]
struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_from_env()?;

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    info!("Starting account server");

    let resources = match ServerResources::from_config(config).await {
        Ok(resources) => Arc::new(resources),
        Err(e) => {
            error!("Failed to initialize server resources: {e}");
            return Err(e.into());
        }
    };

    server::serve(resources).await
}
