//! mcp-swcache server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use swcache_client::{FetchClient, FetchConfig};
use swcache_core::{AppConfig, CacheDb, CachePolicy};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(app = %config.app_name, version = %config.version, db = %config.db_path.display(), "Starting mcp-swcache server on stdio transport");

    let cache = Arc::new(CacheDb::open(&config.db_path).await?);
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from(&config))?);
    let policy = CachePolicy::from_config(&config)?;

    let handler = handler::SwCacheServer::new(cache, fetcher, policy);
    handler.boot().await;

    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
