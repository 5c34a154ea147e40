//! sw_register tool implementation.
//!
//! Installs a new worker version, as a deploy would.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{Registered, Registration, WorkerState};
use swcache_core::CachePolicy;

use super::json_result;

/// Parameters for the sw_register tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwRegisterParams {
    /// Version to deploy, e.g. "1.5.0".
    pub version: String,

    /// Activate without waiting. Defaults to the configured behavior.
    #[serde(default)]
    pub skip_waiting: Option<bool>,
}

/// Output from the sw_register tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwRegisterOutput {
    /// Release tag of the registered worker.
    pub version: String,
    /// Lifecycle state of the registered worker.
    pub state: WorkerState,
    /// Release tag of the worker now in control.
    pub active_version: Option<String>,
    /// Cache generations deleted by activation.
    pub deleted: Vec<String>,
}

/// Implementation of the sw_register tool.
pub async fn register_impl(
    registration: &Registration, base: &CachePolicy, params: SwRegisterParams,
) -> Result<CallToolResult, McpError> {
    let mut policy = base.with_version(params.version.trim())?;
    if let Some(skip_waiting) = params.skip_waiting {
        policy = policy.with_skip_waiting(skip_waiting);
    }

    let Registered { worker, deleted } = registration.register(policy).await?;

    let output = SwRegisterOutput {
        version: worker.version_reply().version,
        state: worker.state().await,
        active_version: registration.active().await.map(|active| active.version_reply().version),
        deleted,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::super::testing::{output_json, policy, setup, site};
    use super::*;

    fn params(version: &str) -> SwRegisterParams {
        SwRegisterParams { version: version.into(), skip_waiting: None }
    }

    #[tokio::test]
    async fn test_register_version_bump() {
        let (_, registration) = setup(site()).await;
        let base = policy();

        let first = output_json(&register_impl(&registration, &base, params("1.0.0")).await.unwrap());
        assert_eq!(first["state"], "activated");
        assert_eq!(first["deleted"], serde_json::json!([]));

        let second = output_json(&register_impl(&registration, &base, params("1.1.0")).await.unwrap());
        assert_eq!(second["version"], "fitlog-v1.1.0");
        assert_eq!(second["active_version"], "fitlog-v1.1.0");
        assert_eq!(second["deleted"], serde_json::json!(["fitlog-static-v1.0.0"]));
    }

    #[tokio::test]
    async fn test_register_without_skip_waiting_leaves_worker_waiting() {
        let (_, registration) = setup(site()).await;
        register_impl(&registration, &policy(), params("1.0.0")).await.unwrap();

        let request = SwRegisterParams { version: "1.1.0".into(), skip_waiting: Some(false) };
        let output = output_json(&register_impl(&registration, &policy(), request).await.unwrap());

        assert_eq!(output["state"], "installed");
        assert_eq!(output["active_version"], "fitlog-v1.0.0");
        assert_eq!(output["deleted"], serde_json::json!([]));
        assert!(registration.waiting().await.is_some());
    }

    #[tokio::test]
    async fn test_register_rejects_bad_version() {
        let (_, registration) = setup(site()).await;
        assert!(register_impl(&registration, &policy(), params("1.0-beta")).await.is_err());
        assert!(register_impl(&registration, &policy(), params("")).await.is_err());
        assert!(registration.active().await.is_none());
    }

    #[tokio::test]
    async fn test_register_offline_fails() {
        let (_, registration) = setup(Default::default()).await;
        let result = register_impl(&registration, &policy(), params("1.0.0")).await;

        let err = result.unwrap_err();
        assert_eq!(err.code.0, -32013);
        assert!(registration.active().await.is_none());
    }
}
