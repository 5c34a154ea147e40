//! cache_generations tool implementation.
//!
//! Lists every cache generation with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::Registration;
use swcache_core::{CachePolicy, GenerationKind};

use super::super::json_result;

/// Parameters for the cache_generations tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsParams {}

/// One cache generation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub entries: u64,
    /// Kind and version, when the name follows `<app>-<kind>-v<version>`.
    pub kind: Option<GenerationKind>,
    pub version: Option<String>,
    /// Whether the active worker uses this generation.
    pub current: bool,
}

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGenerationsOutput {
    pub generations: Vec<GenerationInfo>,
}

/// Implementation of the cache_generations tool.
pub async fn generations_impl(
    registration: &Registration, base: &CachePolicy, _params: CacheGenerationsParams,
) -> Result<CallToolResult, McpError> {
    let active = registration.active().await;
    let storage = registration.storage();

    let mut generations = Vec::new();
    for name in storage.keys().await? {
        let entries = storage.entry_count(&name).await?;
        let (kind, version) = match base.generations().parse(&name) {
            Some((kind, version)) => (Some(kind), Some(version.to_string())),
            None => (None, None),
        };
        let current = active
            .as_ref()
            .is_some_and(|worker| worker.policy().generations().is_current(&name));
        generations.push(GenerationInfo { name, entries, kind, version, current });
    }

    json_result(&CacheGenerationsOutput { generations })
}
