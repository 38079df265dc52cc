//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::AppState;
use crate::tools::{
    ConnectivitySetParams, OfflineDeleteParams, OfflineDownloadParams, OfflineStatusParams, PageOpenParams,
    PageViewParams, SearchParams, SearchReindexParams, TocGetParams, offline, pages, search, toc,
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

/// The main MCP server handler for klazz-offline.
#[derive(Clone)]
pub struct KlazzServer {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl KlazzServer {
    /// Create a new server handler.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { tool_router: Self::tool_router(), state }
    }

    #[tool(description = "Open a tutorial page by id ({language}/{slug}). Live when online, saved copy with an offline banner otherwise.")]
    async fn page_open(&self, params: Parameters<PageOpenParams>) -> Result<CallToolResult, McpError> {
        pages::open_impl(&self.state.sync, params.0).await
    }

    #[tool(description = "Record a page that was just rendered so it is available offline.")]
    async fn page_view(&self, params: Parameters<PageViewParams>) -> Result<CallToolResult, McpError> {
        pages::view_impl(&self.state.sync, params.0).await
    }

    #[tool(description = "Fetch and save the selected pages for offline use. Returns per-page success and failure.")]
    async fn offline_download(&self, params: Parameters<OfflineDownloadParams>) -> Result<CallToolResult, McpError> {
        offline::download_impl(&self.state.sync, params.0).await
    }

    #[tool(description = "Remove a saved page.")]
    async fn offline_delete(&self, params: Parameters<OfflineDeleteParams>) -> Result<CallToolResult, McpError> {
        offline::delete_impl(&self.state.sync, params.0).await
    }

    /// Saved pages, connectivity and the active response bucket.
    #[tool(description = "Show connectivity, the active cache bucket, saved pages, and optionally which table-of-contents topics of a language are saved.")]
    async fn offline_status(&self, params: Parameters<OfflineStatusParams>) -> Result<CallToolResult, McpError> {
        let bucket = self.state.proxy.current_bucket().await;
        offline::status_impl(&self.state.sync, self.state.proxy.db(), bucket, &self.state.config.content_dir, params.0)
            .await
    }

    #[tool(description = "Set connectivity to online or offline. Going online refreshes saved pages in the background.")]
    async fn connectivity_set(&self, params: Parameters<ConnectivitySetParams>) -> Result<CallToolResult, McpError> {
        offline::connectivity_set_impl(&self.state.sync, params.0)
    }

    #[tool(description = "Re-fetch every saved page now. Pages that fail keep their previous content.")]
    async fn offline_resync(&self) -> Result<CallToolResult, McpError> {
        offline::resync_impl(&self.state.sync).await
    }

    #[tool(description = "Fuzzy search tutorial titles and snippets. Queries need at least two characters.")]
    async fn search(&self, params: Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        search::search_impl(&self.state.search, params.0).await
    }

    #[tool(description = "Rebuild the search index from the markdown content tree.")]
    async fn search_reindex(&self, params: Parameters<SearchReindexParams>) -> Result<CallToolResult, McpError> {
        search::reindex_impl(&self.state.search, &self.state.config, params.0).await
    }

    #[tool(description = "Get a language's table of contents split into sections.")]
    async fn toc_get(&self, params: Parameters<TocGetParams>) -> Result<CallToolResult, McpError> {
        toc::toc_impl(&self.state.config.content_dir, params.0)
    }
}

impl ServerHandler for KlazzServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "klazz-offline".into(),
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
