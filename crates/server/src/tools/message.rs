//! sw_message and sw_sync tool implementations.
//!
//! Events a page or the browser would deliver to the worker.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{ControlMessage, Registration, VersionReply};

use super::json_result;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message object, e.g. {"type": "GET_VERSION"} or {"type": "SKIP_WAITING"}.
    pub message: serde_json::Value,
}

/// Output from the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// True when the message was not recognized and nothing happened.
    pub ignored: bool,
    /// Reply to GET_VERSION.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<VersionReply>,
    /// Release tag of the worker in control after the message was handled.
    pub active_version: Option<String>,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(registration: &Registration, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let ignored = ControlMessage::parse(&params.message).is_none();
    let reply = registration.post_message(&params.message).await;

    let output = SwMessageOutput {
        ignored,
        reply,
        active_version: registration.active().await.map(|worker| worker.version_reply().version),
    };
    json_result(&output)
}

/// Parameters for the sw_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncParams {
    /// Sync tag. Only "background-sync" is handled.
    pub tag: String,
}

/// Output from the sw_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncOutput {
    pub handled: bool,
}

/// Implementation of the sw_sync tool.
pub async fn sync_impl(registration: &Registration, params: SwSyncParams) -> Result<CallToolResult, McpError> {
    let output = SwSyncOutput { handled: registration.sync(&params.tag).await };
    json_result(&output)
}
