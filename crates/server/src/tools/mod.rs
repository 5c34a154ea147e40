//! MCP tool implementations.
//!
//! This module contains all tools exposed by the mcp-swcache server.

pub mod cache;
pub mod fetch;
pub mod message;
pub mod register;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use swcache_core::Error;

pub use cache::{CacheGenerationsParams, CachePurgeParams, generations_impl, purge_impl};
pub use fetch::{SwFetchParams, fetch_impl};
pub use message::{SwMessageParams, SwSyncParams, message_impl, sync_impl};
pub use register::{SwRegisterParams, register_impl};

/// Wrap a tool output as pretty-printed JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
