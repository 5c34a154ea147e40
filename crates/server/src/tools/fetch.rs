//! sw_fetch tool implementation.
//!
//! Sends a request through the active worker, exactly as an intercepted page
//! request would be handled.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{Registration, fetch::resolve};
use swcache_core::{Destination, Error, Request, RequestMode, Strategy};
use url::Url;

use super::json_result;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// URL to fetch. Relative URLs are resolved against the site origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request destination: document, image, script, style, font, manifest.
    #[serde(default)]
    pub destination: Option<String>,

    /// Request mode: navigate, same-origin, no-cors, cors.
    /// Defaults to navigate for documents and no-cors otherwise.
    #[serde(default)]
    pub mode: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The resolved request URL.
    pub url: String,
    pub status: u16,
    /// Strategy the active worker applied, absent when the request bypassed it.
    pub strategy: Option<Strategy>,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Body as text, when it is valid UTF-8.
    pub body_text: Option<String>,
    pub body_bytes: usize,
}

impl SwFetchParams {
    fn into_request(self, origin: &Url) -> Result<Request, Error> {
        let url = resolve(origin, &self.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if self.method.trim().is_empty() {
            return Err(Error::InvalidInput("method must not be empty".into()));
        }

        let destination = self.destination.as_deref().map(Destination::parse).unwrap_or_default();
        let mode = match self.mode.as_deref() {
            Some(mode) => mode.parse()?,
            None if destination == Destination::Document => RequestMode::Navigate,
            None => RequestMode::default(),
        };
        Ok(Request::new(&self.method, url, destination, mode))
    }
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(
    registration: &Registration, origin: &Url, params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    let request = params.into_request(origin)?;

    let (strategy, response) = registration.dispatch(&request).await;

    let output = SwFetchOutput {
        url: request.url.to_string(),
        status: response.status,
        strategy,
        content_type: response.content_type().map(str::to_string),
        body_text: response.text().map(str::to_string),
        body_bytes: response.body.len(),
        headers: response.headers,
    };
    json_result(&output)
}
