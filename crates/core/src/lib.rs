//! Core types and shared functionality for tilecache.
//!
//! This crate provides:
//! - Partition storage with SQLite backend
//! - The partition registry and deployment descriptor
//! - Request classification
//! - Control channel messages
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod classify;
pub mod config;
pub mod control;
pub mod error;
pub mod registry;
pub mod request;
pub mod response;

pub use cache::{CacheDb, PartitionSummary, StoredEntry};
pub use classify::{Classification, Classifier};
pub use config::{AppConfig, ConfigError};
pub use control::{ControlMessage, ControlReply};
pub use error::Error;
pub use registry::{Deployment, PartitionClass, PartitionName};
pub use request::{Destination, Request, RequestIdentity, RequestMode};
pub use response::{Response, ResponseType};
