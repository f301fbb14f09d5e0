//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;
use url::Url;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;
const MAX_PREFETCH_CONCURRENCY: usize = 16;

fn require_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::Invalid { field: field.into(), reason: format!("{value}: {e}") })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::Invalid { field: field.into(), reason: format!("unsupported scheme: {scheme}") }),
    }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `app_origin`, `tile_prefix` or `cdn_prefix` is not an http(s) URL
    /// - a partition name is malformed or assigned to the wrong class
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `prefetch_concurrency` is outside 1..=16
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if `shell_assets` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_http_url("app_origin", &self.app_origin)?;
        require_http_url("tile_prefix", &self.tile_prefix)?;
        require_http_url("cdn_prefix", &self.cdn_prefix)?;

        if self.shell_assets.is_empty() {
            return Err(ConfigError::Missing {
                field: "shell_assets".into(),
                hint: "List at least the application entry page, e.g. [\"/index.html\"]".into(),
            });
        }
        self.shell_asset_urls()?;

        self.deployment()?;

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > MAX_BODY_BYTES {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 100MB".into() });
        }

        if self.prefetch_concurrency == 0 || self.prefetch_concurrency > MAX_PREFETCH_CONCURRENCY {
            return Err(ConfigError::Invalid {
                field: "prefetch_concurrency".into(),
                reason: format!("must be between 1 and {MAX_PREFETCH_CONCURRENCY}"),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.tile_prefix.starts_with(&self.app_origin) {
            tracing::debug!(
                tile_prefix = %self.tile_prefix,
                app_origin = %self.app_origin,
                "Tile prefix lies under the application origin; \
                 tile rules take precedence over shell rules"
            );
        } else {
            tracing::warn!(
                tile_prefix = %self.tile_prefix,
                app_origin = %self.app_origin,
                "Tile prefix is on another origin; \
                 its responses are opaque and tiles will not be kept offline"
            );
        }

        Ok(())
    }
}
