//! cache_purge tool implementation.
//!
//! Purges runtime-cached entries by age. Install-time resources in static
//! generations are never purged.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{CacheDb, CachePolicy, CacheStorage, Error, GenerationKind};

use super::super::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Purge dynamic entries stored more than this many days ago.
    pub older_than_days: i64,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Number of entries deleted.
    pub deleted: u64,
    /// Dynamic generations that were scanned.
    pub generations: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &CacheDb, base: &CachePolicy, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.older_than_days < 0 {
        return Err(Error::InvalidInput("older_than_days must not be negative".to_string()).into());
    }

    let mut deleted_total = 0u64;
    let mut generations = Vec::new();

    for name in cache.keys().await? {
        if !matches!(base.generations().parse(&name), Some((GenerationKind::Dynamic, _))) {
            continue;
        }
        let deleted = cache.purge_entries_older_than(&name, params.older_than_days).await?;
        tracing::info!(generation = %name, deleted, "purged dynamic entries");
        deleted_total += deleted;
        generations.push(name);
    }

    let output = CachePurgeOutput { deleted: deleted_total, generations };
    json_result(&output)
}
