//! Control messages posted to the worker by pages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sync tag the worker answers to. Other tags are ignored.
pub const BACKGROUND_SYNC_TAG: &str = "background-sync";

/// Inbound control message, keyed by its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Activate the waiting worker now.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    /// Ask for the running cache version.
    #[serde(rename = "GET_VERSION")]
    GetVersion,
}

impl ControlMessage {
    /// Parse a posted message. Anything unrecognized yields `None`.
    pub fn parse(message: &Value) -> Option<Self> {
        ControlMessage::deserialize(message).ok()
    }
}

/// Reply to `GET_VERSION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VersionReply {
    /// Release tag, `<app>-v<version>`.
    pub version: String,
    pub static_cache: String,
    pub dynamic_cache: String,
}
