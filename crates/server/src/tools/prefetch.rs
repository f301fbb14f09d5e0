//! tiles_prefetch tool implementation.
//!
//! Downloads a list of tile URLs through the engine with bounded concurrency,
//! the same way a map view would request them. A tile is kept in the live
//! tile partition only when its response is basic, which in practice means
//! the tile server shares the application origin. Cross-origin tiles come
//! back opaque and are reported with `stored: false`.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tilecache_core::{Classification, Destination, Request};
use tilecache_worker::fetch::resolve;
use tilecache_worker::{HostHandle, ServedFrom};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

use super::json_result;
use crate::error::ToolError;

const MAX_CONCURRENCY: u8 = 16;

/// Input parameters for tiles_prefetch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TilesPrefetchParams {
    /// Tile URLs to download, in order.
    pub urls: Vec<String>,

    /// Maximum number of concurrent downloads (default: configured value, max: 16).
    #[serde(default)]
    pub max_concurrency: Option<u8>,

    /// Stop at the first failure (default: false).
    #[serde(default)]
    pub fail_fast: bool,
}

/// Per-URL outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum PrefetchStatus {
    /// Already present in the tile partition.
    Cached,
    /// Downloaded by this call.
    Fetched,
    /// Could not be downloaded.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrefetchItem {
    pub url: String,
    pub status: PrefetchStatus,
    /// Partition class the URL was routed to; anything other than tile
    /// imagery means the URL is not under the tile prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Whether the response was written to the partition; opaque and
    /// non-200 responses are served but not kept.
    pub stored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PrefetchSummary {
    pub total: u32,
    pub fetched: u32,
    pub cached: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TilesPrefetchOutput {
    /// Results in input order; truncated after the first failure with `fail_fast`.
    pub results: Vec<PrefetchItem>,
    pub summary: PrefetchSummary,
}

async fn prefetch_one(host: HostHandle, origin: Url, url: String) -> PrefetchItem {
    let request = match resolve(&url, &origin) {
        Ok(resolved) => Request::get(resolved).with_destination(Destination::Image),
        Err(e) => return failed(url, e.to_string()),
    };

    match host.fetch(request).await {
        Ok((classification, served)) => {
            let status = match served.source {
                ServedFrom::Cache => PrefetchStatus::Cached,
                ServedFrom::Network => PrefetchStatus::Fetched,
            };
            PrefetchItem { url, status, classification: Some(classification), stored: served.stored, error: None }
        }
        Err(e) => failed(url, e.to_string()),
    }
}

fn failed(url: String, error: String) -> PrefetchItem {
    PrefetchItem { url, status: PrefetchStatus::Failed, classification: None, stored: false, error: Some(error) }
}

/// Implementation of the tiles_prefetch tool.
pub async fn prefetch_impl(
    host: &HostHandle, origin: &Url, default_concurrency: usize, params: TilesPrefetchParams,
) -> Result<CallToolResult, McpError> {
    if params.urls.is_empty() {
        return Err(ToolError::InvalidInput("urls cannot be empty".into()).into());
    }

    let max_concurrency = match params.max_concurrency {
        Some(0) => return Err(ToolError::InvalidInput("max_concurrency must be at least 1".into()).into()),
        Some(n) => n.min(MAX_CONCURRENCY) as usize,
        None => default_concurrency.max(1),
    };

    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let mut join_set = JoinSet::new();

    for (index, url) in params.urls.iter().cloned().enumerate() {
        let semaphore = semaphore.clone();
        let host = host.clone();
        let origin = origin.clone();

        join_set.spawn(async move {
            // The semaphore is never closed.
            let _permit = semaphore.acquire_owned().await;
            (index, prefetch_one(host, origin, url).await)
        });
    }

    let mut slots: Vec<Option<PrefetchItem>> = vec![None; params.urls.len()];
    let mut summary = PrefetchSummary::default();

    while let Some(joined) = join_set.join_next().await {
        let (index, item) = joined.map_err(|e| ToolError::TaskFailed(e.to_string()))?;

        match item.status {
            PrefetchStatus::Cached => summary.cached += 1,
            PrefetchStatus::Fetched => summary.fetched += 1,
            PrefetchStatus::Failed => summary.failed += 1,
        }
        let failed = item.status == PrefetchStatus::Failed;
        slots[index] = Some(item);

        if params.fail_fast && failed {
            join_set.shutdown().await;
            break;
        }
    }

    let results: Vec<PrefetchItem> = slots.into_iter().flatten().collect();
    summary.total = results.len() as u32;

    tracing::info!(
        total = summary.total,
        fetched = summary.fetched,
        cached = summary.cached,
        failed = summary.failed,
        "prefetch complete"
    );

    json_result(&TilesPrefetchOutput { results, summary })
}
