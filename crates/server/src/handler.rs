//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker registration and the cache store.
use std::sync::Arc;

use crate::tools::{
    CacheGenerationsParams, CachePurgeParams, SwFetchParams, SwMessageParams, SwRegisterParams, SwSyncParams,
    fetch_impl, generations_impl, message_impl, purge_impl, register_impl, sync_impl,
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
use swcache_client::{Fetcher, Registration};
use swcache_core::{CacheDb, CachePolicy};

/// The main MCP server handler for mcp-swcache.
#[derive(Clone)]
pub struct SwCacheServer {
    registration: Arc<Registration>,
    cache: Arc<CacheDb>,
    policy: Arc<CachePolicy>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwCacheServer {
    /// Create a server whose worker stores generations in `cache`.
    ///
    /// `policy` is the configured deploy; `sw_register` derives new versions from it.
    pub fn new(cache: Arc<CacheDb>, fetcher: Arc<dyn Fetcher>, policy: CachePolicy) -> Self {
        let registration = Arc::new(Registration::new(cache.clone(), fetcher));
        Self { registration, cache, policy: Arc::new(policy), tool_router: Self::tool_router() }
    }

    /// Register the configured version.
    ///
    /// An install failure is logged and requests keep passing through to the network.
    pub async fn boot(&self) {
        let release = self.policy.generations().release();
        match self.registration.register(self.policy.as_ref().clone()).await {
            Ok(registered) => tracing::info!(
                version = %release,
                state = ?registered.worker.state().await,
                deleted = registered.deleted.len(),
                "worker registered"
            ),
            Err(e) => tracing::error!(version = %release, error = %e, "initial install failed, serving from network"),
        }
    }

    /// Fetch a URL through the active worker.
    #[tool(
        description = "Fetch a URL through the service worker. Applies cache-first, network-first or stale-while-revalidate and returns the response with the strategy used."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, self.policy.origin(), params.0).await
    }

    /// Install a new worker version.
    #[tool(
        description = "Deploy a new worker version. Installs critical resources and activates it when nothing is active or skip-waiting applies, deleting stale cache generations."
    )]
    async fn sw_register(&self, params: Parameters<SwRegisterParams>) -> Result<CallToolResult, McpError> {
        register_impl(&self.registration, &self.policy, params.0).await
    }

    /// Post a control message to the worker.
    #[tool(description = "Post a message to the worker. Supports {\"type\": \"SKIP_WAITING\"} and {\"type\": \"GET_VERSION\"}.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.registration, params.0).await
    }

    /// Deliver a background sync event.
    #[tool(description = "Deliver a background sync event to the worker. Returns whether the tag was handled.")]
    async fn sw_sync(&self, params: Parameters<SwSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.registration, params.0).await
    }

    /// List cache generations.
    #[tool(description = "List cache generations with entry counts and whether the active worker uses them.")]
    async fn cache_generations(&self, params: Parameters<CacheGenerationsParams>) -> Result<CallToolResult, McpError> {
        generations_impl(&self.registration, &self.policy, params.0).await
    }

    /// Purge old runtime-cached entries.
    #[tool(description = "Purge dynamic cache entries stored more than older_than_days days ago.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.cache, &self.policy, params.0).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mcp-swcache".into(),
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
