//! cache_control tool implementation.
//!
//! Posts a raw message to the engine's control channel and returns whatever
//! comes back. Unrecognised messages produce no reply.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tilecache_core::ControlReply;
use tilecache_worker::HostHandle;

use super::super::json_result;

/// Parameters for the cache_control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheControlParams {
    /// Message to post, e.g. `{"action": "deleteCache"}`.
    pub message: Value,
}

/// Output from the cache_control tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheControlOutput {
    /// `true` if the engine answered.
    pub replied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ControlReply>,
}

/// Implementation of the cache_control tool.
pub async fn control_impl(host: &HostHandle, params: CacheControlParams) -> Result<CallToolResult, McpError> {
    let reply = host.post_message(params.message).await?;
    json_result(&CacheControlOutput { replied: reply.is_some(), reply })
}
