//! tilecache server entry point.
//!
//! Boots the offline cache engine and exposes it as an MCP server on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tilecache_core::{AppConfig, CacheDb};
use tilecache_worker::{Dispatcher, FetchClient, FetchConfig, Host};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache database at {}", config.db_path.display()))?;
    let network = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config)?)?);
    let dispatcher = Dispatcher::from_config(&config, db.clone(), network)?;
    let deployment = dispatcher.deployment().clone();

    tracing::info!(deployment = %deployment.id(), db = %config.db_path.display(), "starting engine");
    let (host, startup) = Host::start(dispatcher).await?;
    if let Some(report) = &startup.installed {
        tracing::info!(stored = report.stored.len(), failed = report.failed.len(), "application shell installed");
    }
    tracing::info!(deleted = startup.activated.deleted.len(), "engine active");

    let origin = config.app_origin_url()?;
    let handler = handler::TileCacheServer::new(host, db, deployment, origin, Arc::new(config));

    tracing::info!("Starting tilecache server on stdio transport");
    let server = serve_server(handler, stdio()).await?;

    server.waiting().await?;

    Ok(())
}
