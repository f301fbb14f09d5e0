//! tile_fetch tool implementation.
//!
//! Routes a single request through the engine exactly as an intercepted page
//! request would be: classified, then served read-through from its partition
//! or passed to the network.

use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tilecache_core::{Classification, Destination, Error, Request, RequestMode};
use tilecache_worker::fetch::resolve;
use tilecache_worker::{HostHandle, ServedFrom};
use url::Url;

use super::json_result;

/// Parameters for the tile_fetch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TileFetchParams {
    /// Absolute URL, or a path resolved against the application origin.
    pub url: String,

    /// Request mode: "navigate", "same-origin", "no-cors" (default) or "cors".
    #[serde(default)]
    pub mode: Option<String>,

    /// Request destination, e.g. "image", "script", "document". Empty by default.
    #[serde(default)]
    pub destination: Option<String>,

    /// HTTP method (default: GET). Only GET requests are ever cached.
    #[serde(default)]
    pub method: Option<String>,

    /// Include the response body, base64-encoded (default: false).
    #[serde(default)]
    pub include_body: bool,
}

/// Output from the tile_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TileFetchOutput {
    pub url: String,
    pub classification: Classification,
    /// "cache" or "network".
    pub served_from: String,
    /// Whether a copy was written to the partition by this call.
    pub stored: bool,
    pub status: u16,
    pub response_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,
}

/// Build the engine request described by `params`.
pub(crate) fn build_request(origin: &Url, params: &TileFetchParams) -> Result<Request, Error> {
    let url = resolve(&params.url, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let mut request = Request::get(url);

    if let Some(mode) = params.mode.as_deref() {
        request = request.with_mode(RequestMode::from_str(mode)?);
    }
    if let Some(destination) = params.destination.as_deref() {
        request = request.with_destination(Destination::from_str(destination)?);
    }
    if let Some(method) = params.method.as_deref() {
        request = request.with_method(method);
    }

    Ok(request)
}

/// Implementation of the tile_fetch tool.
pub async fn fetch_impl(host: &HostHandle, origin: &Url, params: TileFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(origin, &params)?;
    let (classification, served) = host.fetch(request).await?;

    let response = &served.response;
    let output = TileFetchOutput {
        url: response.url.to_string(),
        classification,
        served_from: match served.source {
            ServedFrom::Cache => "cache".to_string(),
            ServedFrom::Network => "network".to_string(),
        },
        stored: served.stored,
        status: response.status,
        response_type: response.response_type.to_string(),
        content_type: response.content_type().map(str::to_string),
        bytes: response.body.len(),
        body_base64: params.include_body.then(|| BASE64.encode(&response.body)),
    };

    json_result(&output)
}
