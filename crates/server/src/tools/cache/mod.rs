//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting partitions and driving the
//! control channel.

pub mod control;
pub mod partitions;

pub use control::{CacheControlParams, control_impl};
pub use partitions::{CachePartitionsParams, partitions_impl};
