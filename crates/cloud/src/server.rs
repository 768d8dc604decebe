// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server assembly: shared context, router, and the serve loop.

use crate::files::FileStore;
use crate::registry::AgentRegistry;
use crate::tasks::TaskManager;
use axum::routing::{delete, get, post, put};
use axum::Router;
use fc_storage::Store;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state for HTTP and WebSocket handlers.
pub struct AppCtx {
    pub store: Arc<Store>,
    pub registry: Arc<AgentRegistry>,
    pub tasks: Arc<TaskManager>,
    pub files: Arc<FileStore>,
    /// Whether the listener serves TLS (connections are recorded as `wss`).
    pub tls: bool,
}

impl AppCtx {
    pub fn new(store: Arc<Store>, file_root: impl Into<PathBuf>, tls: bool) -> anyhow::Result<Self> {
        let registry = Arc::new(AgentRegistry::new(Arc::clone(&store)));
        let tasks = Arc::new(TaskManager::new(Arc::clone(&store), Arc::clone(&registry)));
        let files = Arc::new(FileStore::new(Arc::clone(&store), file_root)?);
        Ok(Self {
            store,
            registry,
            tasks,
            files,
            tls,
        })
    }
}

/// Serve configuration from the command line.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub storage_root: PathBuf,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl ServerConfig {
    pub fn tls_enabled(&self) -> bool {
        self.cert.is_some() && self.key.is_some()
    }
}

/// Build the router: `/ws` plus the `/api/v1` surface.
pub fn build_router(ctx: Arc<AppCtx>) -> Router {
    Router::new()
        .route("/ws", get(crate::ws::ws_handler))
        .route("/api/v1/agents", get(crate::http::list_agents))
        .route("/api/v1/agents/:id", get(crate::http::get_agent))
        .route("/api/v1/agents/:id", put(crate::http::update_agent))
        .route("/api/v1/agents/:id", delete(crate::http::delete_agent))
        .route("/api/v1/agents/:id/status", get(crate::http::agent_status))
        .route("/api/v1/tasks", post(crate::http::create_task))
        .route("/api/v1/tasks", get(crate::http::list_tasks))
        .route("/api/v1/tasks/:id", get(crate::http::get_task))
        .route("/api/v1/tasks/:id/logs", get(crate::http::task_logs))
        .route("/api/v1/tasks/:id/cancel", post(crate::http::cancel_task))
        .route("/api/v1/files", post(crate::http::upload_file))
        .route("/api/v1/files", get(crate::http::list_files))
        .route("/api/v1/files/:id", get(crate::http::get_file))
        .route("/api/v1/files/:id/download", get(crate::http::download_file))
        .route(
            "/api/v1/files/:id/distribute",
            post(crate::http::distribute_file),
        )
        .with_state(ctx)
}

/// Run the server until shutdown, with TLS when cert and key are present.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let store = Arc::new(Store::open(&config.db_path)?);
    let ctx = Arc::new(AppCtx::new(
        store,
        &config.storage_root,
        config.tls_enabled(),
    )?);
    let router = build_router(ctx);

    match (&config.cert, &config.key) {
        (Some(cert), Some(key)) => {
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key).await?;
            tracing::info!(addr = %config.addr, "cloud server listening (wss)");
            axum_server::bind_rustls(config.addr, tls)
                .serve(router.into_make_service())
                .await?;
        }
        _ => {
            tracing::info!(addr = %config.addr, "cloud server listening (ws)");
            let listener = tokio::net::TcpListener::bind(config.addr).await?;
            axum::serve(listener, router).await?;
        }
    }
    Ok(())
}
