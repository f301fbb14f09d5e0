//! SQLite-backed partition storage.
//!
//! This module provides the durable store behind every cache partition,
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named partitions, created lazily and deleted wholesale
//! - Entries keyed by a SHA-256 request identity
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
#[cfg(any(test, feature = "test-util"))]
pub mod faults;
pub mod hash;
pub mod migrations;
pub mod partitions;
pub mod state;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::StoredEntry;
pub use partitions::PartitionSummary;
