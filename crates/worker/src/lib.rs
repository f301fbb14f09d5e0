//! Background engine for tilecache.
//!
//! Classifies intercepted requests, serves them read-through from the
//! partitions in `tilecache-core`, and runs the install/activate lifecycle
//! and the cache control channel on behalf of a host.

pub mod control;
pub mod dispatch;
pub mod fetch;
pub mod host;
pub mod lifecycle;
pub mod strategy;

pub use dispatch::{Dispatcher, Outcome, Trigger};
pub use fetch::{FetchClient, FetchConfig, Network};
pub use host::{EngineState, Host, HostHandle, Startup};
pub use lifecycle::{ActivateReport, Failure, InstallReport, Lifecycle, LifecycleSignal};
pub use strategy::{CacheStrategy, Served, ServedFrom};
