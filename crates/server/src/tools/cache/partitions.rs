//! cache_partitions tool implementation.
//!
//! Lists stored partitions and how each relates to the running deployment.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tilecache_core::{CacheDb, Deployment, PartitionClass};

use super::super::json_result;

/// Parameters for the cache_partitions tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePartitionsParams {
    /// Include the stored URLs of each partition (default: false).
    #[serde(default)]
    pub include_urls: bool,
}

/// How a stored partition relates to the running deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PartitionState {
    /// Currently served from.
    Live,
    /// Older generation; removed on the next activation.
    Stale,
    /// Not one of ours; never touched.
    Foreign,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionInfo {
    pub name: String,
    pub state: PartitionState,
    pub entries: u64,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
}

/// Output from the cache_partitions tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePartitionsOutput {
    /// Deployment the last completed install was for.
    pub installed_deployment: Option<String>,
    pub live_shell: String,
    pub live_tiles: String,
    pub partitions: Vec<PartitionInfo>,
    pub checked_at: String,
}

/// Implementation of the cache_partitions tool.
pub async fn partitions_impl(
    db: &CacheDb, deployment: &Deployment, params: CachePartitionsParams,
) -> Result<CallToolResult, McpError> {
    let mut partitions = Vec::new();
    for summary in db.partition_summaries().await? {
        let state = if deployment.is_live(&summary.name) {
            PartitionState::Live
        } else if deployment.is_stale(&summary.name) {
            PartitionState::Stale
        } else {
            PartitionState::Foreign
        };
        let urls = if params.include_urls { Some(db.entry_urls(&summary.name).await?) } else { None };

        partitions.push(PartitionInfo {
            name: summary.name,
            state,
            entries: summary.entries,
            created_at: summary.created_at,
            urls,
        });
    }

    let output = CachePartitionsOutput {
        installed_deployment: db.installed_deployment().await?,
        live_shell: deployment.live(PartitionClass::ApplicationShell).to_string(),
        live_tiles: deployment.live(PartitionClass::TileImagery).to_string(),
        partitions,
        checked_at: chrono::Utc::now().to_rfc3339(),
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::parse_output;
    use tilecache_core::{Request, Response, ResponseType};

    #[tokio::test]
    async fn test_partition_states() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["appshell-v1", "tiles-v1", "tiles-v2", "offline-maps"] {
            db.open_partition(name).await.unwrap();
        }
        let deployment = Deployment::with_generations(1, 2).unwrap();

        let result = partitions_impl(&db, &deployment, CachePartitionsParams::default()).await.unwrap();
        let output: CachePartitionsOutput = parse_output(&result);

        let state = |name: &str| output.partitions.iter().find(|p| p.name == name).map(|p| p.state);
        assert_eq!(state("appshell-v1"), Some(PartitionState::Live));
        assert_eq!(state("tiles-v2"), Some(PartitionState::Live));
        assert_eq!(state("tiles-v1"), Some(PartitionState::Stale));
        assert_eq!(state("offline-maps"), Some(PartitionState::Foreign));
        assert_eq!(output.live_tiles, "tiles-v2");
        assert_eq!(output.installed_deployment, None);
    }

    #[tokio::test]
    async fn test_include_urls() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_partition("tiles-v1").await.unwrap();
        let request = Request::parse("https://tile.example.org/0/0/0.png").unwrap();
        let response = Response::new(request.url.clone(), 200, ResponseType::Basic, &b"t"[..]);
        db.put_entry("tiles-v1", &request, &response).await.unwrap();

        let params = CachePartitionsParams { include_urls: true };
        let output: CachePartitionsOutput =
            parse_output(&partitions_impl(&db, &Deployment::default(), params).await.unwrap());

        assert_eq!(output.partitions[0].entries, 1);
        assert_eq!(output.partitions[0].urls.as_deref(), Some(&["https://tile.example.org/0/0/0.png".to_string()][..]));
    }
}
