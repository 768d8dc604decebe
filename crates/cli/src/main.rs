// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! farcall: user CLI against the cloud's HTTP API.

mod client;
mod commands;
mod exit_error;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "farcall", about = "Dispatch tasks to farcall agents", version)]
struct Args {
    /// Cloud service URL
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    cloud: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a task on an agent and wait for the result
    Run {
        /// Task type (shell, mysql, postgres, clickhouse, mongo,
        /// elasticsearch, k8s, helm, api, file)
        #[arg(long, default_value = "shell")]
        r#type: String,

        /// Command text or script content
        #[arg(long, default_value = "")]
        command: String,

        /// Read the command content from a local file
        #[arg(long)]
        file: Option<std::path::PathBuf>,

        /// Reference a previously uploaded file by id
        #[arg(long)]
        file_id: Option<String>,

        /// Target agent id
        #[arg(long)]
        agent: String,

        /// JSON parameters
        #[arg(long, default_value = "{}")]
        params: String,
    },

    /// List tasks or agents
    List {
        /// Resource to list (tasks, agents)
        #[arg(default_value = "tasks")]
        resource: String,

        /// Filter tasks by agent id
        #[arg(long, default_value = "")]
        agent: String,

        #[arg(long, default_value_t = 50)]
        limit: u32,
    },

    /// View task logs
    Logs {
        /// Task id
        task: String,

        #[arg(long, default_value_t = 1000)]
        limit: u32,
    },

    /// Upload a file to the cloud
    Upload {
        /// File to upload
        file: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let api = client::ApiClient::new(&args.cloud);

    let result = match args.command {
        Command::Run {
            r#type,
            command,
            file,
            file_id,
            agent,
            params,
        } => commands::run(&api, &r#type, &command, file, file_id, &agent, &params).await,
        Command::List {
            resource,
            agent,
            limit,
        } => commands::list(&api, &resource, &agent, limit).await,
        Command::Logs { task, limit } => commands::logs(&api, &task, limit).await,
        Command::Upload { file } => commands::upload(&api, &file).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e.error);
        std::process::exit(e.code);
    }
}
