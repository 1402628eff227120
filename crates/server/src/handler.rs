//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::state::AppState;
use crate::tools::{
    cache::{self, CacheRemoveParams},
    manga::{self, MangaChaptersParams, MangaDetailsParams, MangaSearchParams},
    reader::{self, ReaderInputParams, ReaderOpenParams, ReaderRetryParams, ReaderViewParams},
};

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

/// The main MCP server handler for mcp-manga.
#[derive(Clone)]
pub struct MangaReadServer {
    tool_router: ToolRouter<Self>,
    state: AppState,
}

#[tool_router]
impl MangaReadServer {
    pub fn new(state: AppState) -> Self {
        Self { tool_router: Self::tool_router(), state }
    }

    #[tool(
        description = "Open a chapter in the reader, replacing any open session. Serves the offline copy when one exists."
    )]
    async fn reader_open(&self, params: Parameters<ReaderOpenParams>) -> Result<CallToolResult, McpError> {
        reader::open_impl(&self.state, params.0).await
    }

    #[tool(description = "Render the open reader. Set settle to wait for in-flight page loads.")]
    async fn reader_view(&self, params: Parameters<ReaderViewParams>) -> Result<CallToolResult, McpError> {
        reader::view_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Send a key, swipe, tap or pointer event to the reader. Arrow keys and swipes turn pages; Escape closes."
    )]
    async fn reader_input(&self, params: Parameters<ReaderInputParams>) -> Result<CallToolResult, McpError> {
        reader::input_impl(&self.state, params.0).await
    }

    #[tool(description = "Retry a page that failed to load, bypassing any cached response.")]
    async fn reader_retry_page(&self, params: Parameters<ReaderRetryParams>) -> Result<CallToolResult, McpError> {
        reader::retry_impl(&self.state, params.0).await
    }

    #[tool(description = "Reload the open chapter from scratch.")]
    async fn reader_reload(&self) -> Result<CallToolResult, McpError> {
        reader::reload_impl(&self.state).await
    }

    #[tool(description = "Save the open chapter for offline reading.")]
    async fn reader_save_offline(&self) -> Result<CallToolResult, McpError> {
        reader::save_offline_impl(&self.state).await
    }

    #[tool(description = "Close the reader and report where navigation should go.")]
    async fn reader_close(&self) -> Result<CallToolResult, McpError> {
        reader::close_impl(&self.state).await
    }

    #[tool(description = "List chapters saved for offline reading and their total size.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        cache::status_impl(&self.state.deps.cache).await
    }

    #[tool(description = "Delete one chapter from the offline cache.")]
    async fn cache_remove(&self, params: Parameters<CacheRemoveParams>) -> Result<CallToolResult, McpError> {
        cache::remove_impl(&self.state.deps.cache, params.0).await
    }

    #[tool(description = "Delete every chapter from the offline cache. Manga metadata is kept.")]
    async fn cache_clear(&self) -> Result<CallToolResult, McpError> {
        cache::clear_impl(&self.state.deps.cache).await
    }

    #[tool(description = "Fetch manga details, falling back to the cached copy when the catalog is unreachable.")]
    async fn manga_details(&self, params: Parameters<MangaDetailsParams>) -> Result<CallToolResult, McpError> {
        manga::details_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Search the catalog for manga with English translations. Filters by title, tags, status, demographic and content rating."
    )]
    async fn manga_search(&self, params: Parameters<MangaSearchParams>) -> Result<CallToolResult, McpError> {
        manga::search_impl(&self.state, params.0).await
    }

    #[tool(description = "List a manga's chapters, newest first, marking the ones saved for offline reading.")]
    async fn manga_chapters(&self, params: Parameters<MangaChaptersParams>) -> Result<CallToolResult, McpError> {
        manga::chapters_impl(&self.state, params.0).await
    }
}

impl ServerHandler for MangaReadServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-manga".into(),
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
