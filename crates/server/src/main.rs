//! mcp-manga server entry point.
//!
//! Boots the manga reader MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

use mangaread_client::{CatalogClient, FetchConfig, PageFetcher, StaticToken};
use mangaread_core::{AppConfig, CacheDb, ChapterCache, MetadataCache, ObjectUrlRegistry};
use mangaread_reader::{ReaderDeps, SessionOptions};

mod handler;
mod state;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(db_path = %config.db_path.display(), api = %config.api_base_url, "Starting mcp-manga server on stdio transport");

    let db = Arc::new(CacheDb::open(&config.db_path).await?);
    let handles = Arc::new(ObjectUrlRegistry::new());
    let fetcher = Arc::new(PageFetcher::new(FetchConfig::from(&config), handles.clone())?);
    let tokens = Arc::new(StaticToken::new(config.auth_token.clone()));
    let catalog = Arc::new(CatalogClient::from_config(&config, tokens)?);

    let cache = ChapterCache::new(db.clone(), fetcher.clone(), handles).with_concurrency(config.cache_concurrency);
    let deps = ReaderDeps { catalog, cache, fetcher };
    let state = state::AppState::new(deps, MetadataCache::new(db), SessionOptions::from(&config));

    let handler = handler::MangaReadServer::new(state);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
