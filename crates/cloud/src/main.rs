// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! farcall-cloud: the central dispatch server.

use clap::Parser;
use fc_cloud::server::{self, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "farcall-cloud", about = "farcall central dispatch server", version)]
struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    addr: SocketAddr,

    /// SQLite database path
    #[arg(long, default_value = "./data/cloud.db")]
    db: PathBuf,

    /// File storage root
    #[arg(long, default_value = "./data/files")]
    storage: PathBuf,

    /// TLS certificate file (enables HTTPS/WSS together with --key)
    #[arg(long)]
    cert: Option<PathBuf>,

    /// TLS private key file
    #[arg(long)]
    key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    if args.cert.is_some() != args.key.is_some() {
        anyhow::bail!("--cert and --key must be provided together");
    }

    if let Some(parent) = args.db.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&args.storage)?;

    let config = ServerConfig {
        addr: args.addr,
        db_path: args.db,
        storage_root: args.storage,
        cert: args.cert,
        key: args.key,
    };

    tokio::select! {
        result = server::run(config) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
