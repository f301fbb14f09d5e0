//! Unified error types for tilecache.
//!
//! Every variant carries a stable code prefix so callers on the other side of
//! the MCP transport can branch on it.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the tilecache engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL list).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Partition name does not follow the `<class>-v<generation>` format.
    #[error("INVALID_PARTITION: {0}")]
    InvalidPartition(String),

    /// The network request could not be completed.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Storage failure reported without a SQLite error attached.
    #[error("CACHE_ERROR: {0}")]
    Storage(String),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored entry could not be encoded or decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// The background engine is no longer accepting triggers.
    #[error("ENGINE_STOPPED")]
    EngineStopped,
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            other => Error::Storage(other.to_string()),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::InvalidPartition(msg) => (-32004, msg.clone()),
            Error::Network(msg) => (-32008, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::Storage(msg) => (-32002, msg.clone()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::CorruptEntry(msg) => (-32002, msg.clone()),
            Error::EngineStopped => (-32013, "Background engine stopped".to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Network("connection refused".to_string());
        assert!(err.to_string().contains("NETWORK_ERROR"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let err = Error::InvalidPartition("tiles".to_string());
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32004);
    }

    #[test]
    fn test_call_error_keeps_inner_cause() {
        let inner = Error::CorruptEntry("bad headers".to_string());
        let err: Error = tokio_rusqlite::Error::Error(inner).into();
        assert!(matches!(err, Error::CorruptEntry(msg) if msg == "bad headers"));

        let closed: Error = tokio_rusqlite::Error::<Error>::ConnectionClosed.into();
        assert!(matches!(closed, Error::Database(tokio_rusqlite::Error::ConnectionClosed)));
    }

    #[test]
    fn test_storage_error_is_cache_error() {
        let err = Error::Storage("disk I/O error".to_string());
        assert_eq!(err.to_string(), "CACHE_ERROR: disk I/O error");
        let mcp_err: McpError = err.into();
        assert_eq!(mcp_err.code.0, -32002);
        assert_eq!(mcp_err.message, "disk I/O error");
    }

    #[test]
    fn test_network_error_code() {
        let mcp_err: McpError = Error::Network("offline".to_string()).into();
        assert_eq!(mcp_err.code.0, -32008);
        assert_eq!(mcp_err.message, "offline");
    }
}
