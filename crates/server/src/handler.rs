//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the engine host.
use std::sync::Arc;

use crate::tools::cache::{CacheControlParams, CachePartitionsParams, control_impl, partitions_impl};
use crate::tools::fetch::{TileFetchParams, fetch_impl};
use crate::tools::prefetch::{TilesPrefetchParams, prefetch_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use tilecache_core::{AppConfig, CacheDb, Deployment};
use tilecache_worker::HostHandle;
use url::Url;

/// The main MCP server handler for tilecache.
#[derive(Clone)]
pub struct TileCacheServer {
    host: HostHandle,
    db: CacheDb,
    deployment: Deployment,
    origin: Url,
    config: Arc<AppConfig>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TileCacheServer {
    /// Create a new server handler around a started host.
    pub fn new(host: HostHandle, db: CacheDb, deployment: Deployment, origin: Url, config: Arc<AppConfig>) -> Self {
        Self { host, db, deployment, origin, config, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Fetch one URL through the offline cache. Tile and application shell requests are answered from their partition when present and stored on a miss when the response is a 200 from the app's own origin; cross-origin responses are served but not kept. Everything else goes straight to the network."
    )]
    async fn tile_fetch(&self, params: Parameters<TileFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.host, &self.origin, params.0).await
    }

    /// Download many tiles into the live tile partition.
    ///
    /// Uses bounded concurrency; each URL is reported as Cached, Fetched or Failed.
    #[tool(
        description = "Download a list of tile URLs into the offline tile cache with bounded concurrency. Only tiles served from the app's own origin (for example through a same-origin proxy) are kept; cross-origin tiles are fetched and reported with stored=false. Reports per-URL status (Cached, Fetched, Failed) and summary counts."
    )]
    async fn tiles_prefetch(&self, params: Parameters<TilesPrefetchParams>) -> Result<CallToolResult, McpError> {
        prefetch_impl(&self.host, &self.origin, self.config.prefetch_concurrency, params.0).await
    }

    #[tool(
        description = "Post a message to the cache control channel. {\"action\":\"deleteCache\"} deletes all downloaded tiles and replies cacheDeleted or cacheDeleteFailed; other messages get no reply."
    )]
    async fn cache_control(&self, params: Parameters<CacheControlParams>) -> Result<CallToolResult, McpError> {
        control_impl(&self.host, params.0).await
    }

    #[tool(description = "List stored cache partitions with entry counts and whether each is live, stale or foreign.")]
    async fn cache_partitions(&self, params: Parameters<CachePartitionsParams>) -> Result<CallToolResult, McpError> {
        partitions_impl(&self.db, &self.deployment, params.0).await
    }
}

impl ServerHandler for TileCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "tilecache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
