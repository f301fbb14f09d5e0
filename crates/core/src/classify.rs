//! Request classification.
//!
//! Decides which partition class an intercepted request belongs to, if any.
//! Rules are evaluated in a fixed priority order:
//!
//! 1. Tile server prefix → tile imagery
//! 2. Document navigation → application shell
//! 3. URL ends with a listed shell asset → application shell
//! 4. Third-party library CDN prefix → application shell
//! 5. Same-origin sub-resource (non-empty destination) → application shell
//! 6. Anything else is not cached
//!
//! Rule 3 compares by suffix only, so an unrelated URL sharing a listed
//! asset's trailing path also matches.

use serde::{Deserialize, Serialize};
use url::{Origin, Url};

use crate::config::{AppConfig, ConfigError};
use crate::registry::PartitionClass;
use crate::request::{Destination, Request, RequestMode};

/// Outcome of classifying a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    ApplicationShell,
    TileImagery,
    Uncached,
}

impl Classification {
    /// Partition class to serve from, or `None` for network-only requests.
    pub fn class(self) -> Option<PartitionClass> {
        match self {
            Classification::ApplicationShell => Some(PartitionClass::ApplicationShell),
            Classification::TileImagery => Some(PartitionClass::TileImagery),
            Classification::Uncached => None,
        }
    }
}

/// Pure request classifier built from deploy-time constants.
#[derive(Debug, Clone)]
pub struct Classifier {
    tile_prefix: String,
    cdn_prefix: String,
    shell_assets: Vec<String>,
    app_origin: Origin,
}

impl Classifier {
    pub fn new(
        tile_prefix: impl Into<String>, cdn_prefix: impl Into<String>, shell_assets: Vec<String>, app_origin: &Url,
    ) -> Self {
        Self {
            tile_prefix: tile_prefix.into(),
            cdn_prefix: cdn_prefix.into(),
            shell_assets,
            app_origin: app_origin.origin(),
        }
    }

    /// Build a classifier from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `app_origin` is not an absolute URL.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let origin = config.app_origin_url()?;
        Ok(Self::new(&config.tile_prefix, &config.cdn_prefix, config.shell_assets.clone(), &origin))
    }

    pub fn classify(&self, url: &Url, mode: RequestMode, destination: Destination) -> Classification {
        let href = url.as_str();

        if href.starts_with(&self.tile_prefix) {
            return Classification::TileImagery;
        }

        if mode == RequestMode::Navigate {
            return Classification::ApplicationShell;
        }

        if self.shell_assets.iter().any(|asset| href.ends_with(asset.as_str())) {
            return Classification::ApplicationShell;
        }

        if href.starts_with(&self.cdn_prefix) {
            return Classification::ApplicationShell;
        }

        if url.origin() == self.app_origin && !destination.is_empty() {
            return Classification::ApplicationShell;
        }

        Classification::Uncached
    }

    pub fn classify_request(&self, request: &Request) -> Classification {
        self.classify(&request.url, request.mode, request.destination)
    }
}
