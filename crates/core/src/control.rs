//! Control channel messages.
//!
//! The foreground posts `{"action": "deleteCache"}`; the background answers
//! the sender with `{"status": "cacheDeleted"}` or
//! `{"status": "cacheDeleteFailed", "error": "..."}`. Anything else is left
//! unanswered so newer foregrounds can talk to older engines.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commands understood by the background engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    /// Delete the live tile imagery partition.
    DeleteCache,
}

impl ControlMessage {
    /// Interpret a raw posted message.
    ///
    /// Returns `None` for anything unrecognised.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Acknowledgements sent back to the originating sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ControlReply {
    CacheDeleted,
    CacheDeleteFailed { error: String },
}
