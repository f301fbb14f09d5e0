//! Background side of the control channel.

use serde_json::Value;
use tilecache_core::{CacheDb, ControlMessage, ControlReply, Deployment, PartitionClass};

/// Handle a posted message.
///
/// Returns the reply to send back to the originating sender, or `None` when
/// the message is not understood and must go unanswered.
pub async fn handle_message(db: &CacheDb, deployment: &Deployment, message: &Value) -> Option<ControlReply> {
    let Some(command) = ControlMessage::from_value(message) else {
        tracing::debug!(%message, "ignoring unrecognised control message");
        return None;
    };

    match command {
        ControlMessage::DeleteCache => Some(delete_tile_cache(db, deployment).await),
    }
}

/// Delete the live tile partition. The application shell is never touched.
pub async fn delete_tile_cache(db: &CacheDb, deployment: &Deployment) -> ControlReply {
    let partition = deployment.live(PartitionClass::TileImagery);
    match db.delete_partition(partition.as_str()).await {
        Ok(existed) => {
            tracing::info!(partition = %partition, existed, "deleted tile cache");
            ControlReply::CacheDeleted
        }
        Err(e) => {
            tracing::warn!(partition = %partition, error = %e, "failed to delete tile cache");
            ControlReply::CacheDeleteFailed { error: e.to_string() }
        }
    }
}
