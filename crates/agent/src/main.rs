// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! farcall-agent: remote executor for the dispatch plane.

use clap::Parser;
use fc_agent::config::{self, PluginConfig};
use fc_agent::{Agent, Client};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "farcall-agent", about = "farcall remote agent", version)]
struct Args {
    /// Cloud service URL
    #[arg(long, default_value = "http://localhost:8080")]
    cloud: String,

    /// Agent instance id (generated when empty)
    #[arg(long, default_value = "")]
    id: String,

    /// Agent name (hostname when empty)
    #[arg(long, default_value = "")]
    name: String,
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

    // CLUSTER_NAME is the compatibility alias for K8S_CLUSTER_NAME.
    if std::env::var("K8S_CLUSTER_NAME").is_err() {
        if let Ok(cluster) = std::env::var("CLUSTER_NAME") {
            std::env::set_var("K8S_CLUSTER_NAME", cluster);
        }
    }

    let agent_id = if args.id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        args.id
    };
    let agent_name = if args.name.is_empty() {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| format!("agent-{}", fc_core::short(&agent_id, 8)))
    } else {
        args.name
    };

    tracing::info!(%agent_name, %agent_id, cloud = %args.cloud, "starting agent");

    let plugins_path =
        config::config_path_from_env("AGENT_PLUGINS_CONFIG", "configs/agent-plugins.yaml");
    let security_path =
        config::config_path_from_env("AGENT_SECURITY_CONFIG", "configs/agent-security.yaml");

    let plugin_config = PluginConfig::load(&plugins_path)?;
    let manager = config::build_manager(&agent_id, &plugin_config, &security_path)?;
    tracing::info!(executors = ?manager.registered_types(), "executors registered");

    let client = Client::new(&args.cloud, &agent_id, &agent_name);
    let agent = Agent::new(client, manager);

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutting down agent");
            signal_token.cancel();
        }
    });

    agent.run(shutdown).await;
    Ok(())
}
