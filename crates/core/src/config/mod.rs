//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (TILECACHE_*)
//! 2. TOML config file (if TILECACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! All values are fixed once loaded; a generation bump means restarting with
//! new partition names.

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::registry::{Deployment, PartitionName};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (TILECACHE_*)
/// 2. TOML config file (if TILECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite partition database.
    ///
    /// Set via TILECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the application shell is served from.
    ///
    /// Shell assets are resolved against it, and same-origin sub-resources
    /// are cached with the shell.
    #[serde(default = "default_app_origin")]
    pub app_origin: String,

    /// URL prefix of the tile server.
    #[serde(default = "default_tile_prefix")]
    pub tile_prefix: String,

    /// URL prefix of the third-party library CDN.
    #[serde(default = "default_cdn_prefix")]
    pub cdn_prefix: String,

    /// Application shell assets fetched on install.
    ///
    /// Set via TILECACHE_SHELL_ASSETS environment variable (TOML array syntax).
    #[serde(default = "default_shell_assets")]
    pub shell_assets: Vec<String>,

    /// Live application shell partition, `appshell-v<generation>`.
    #[serde(default = "default_shell_partition")]
    pub shell_partition: String,

    /// Live tile partition, `tiles-v<generation>`.
    #[serde(default = "default_tile_partition")]
    pub tile_partition: String,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Default concurrency for tile prefetch batches.
    #[serde(default = "default_prefetch_concurrency")]
    pub prefetch_concurrency: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./tilecache.sqlite")
}

fn default_app_origin() -> String {
    "http://localhost:8080".into()
}

fn default_tile_prefix() -> String {
    "https://tile.openstreetmap.org/".into()
}

fn default_cdn_prefix() -> String {
    "https://unpkg.com/".into()
}

fn default_shell_assets() -> Vec<String> {
    ["/", "/index.html", "/app.js", "/style.css", "/manifest.json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_shell_partition() -> String {
    "appshell-v1".into()
}

fn default_tile_partition() -> String {
    "tiles-v1".into()
}

fn default_user_agent() -> String {
    "tilecache/0.1".into()
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_prefetch_concurrency() -> usize {
    4
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            app_origin: default_app_origin(),
            tile_prefix: default_tile_prefix(),
            cdn_prefix: default_cdn_prefix(),
            shell_assets: default_shell_assets(),
            shell_partition: default_shell_partition(),
            tile_partition: default_tile_partition(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            prefetch_concurrency: default_prefetch_concurrency(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `TILECACHE_`
    /// 2. TOML file from `TILECACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("TILECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("TILECACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The application origin as a parsed URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute URL.
    pub fn app_origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.app_origin)
            .map_err(|e| ConfigError::Invalid { field: "app_origin".into(), reason: e.to_string() })
    }

    /// Shell asset URLs resolved against the application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if an asset cannot be resolved.
    pub fn shell_asset_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let origin = self.app_origin_url()?;
        self.shell_assets
            .iter()
            .map(|asset| {
                origin
                    .join(asset)
                    .map_err(|e| ConfigError::Invalid { field: "shell_assets".into(), reason: format!("{asset}: {e}") })
            })
            .collect()
    }

    /// The deployment descriptor for the configured partition names.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a partition name is malformed or
    /// belongs to the wrong class.
    pub fn deployment(&self) -> Result<Deployment, ConfigError> {
        let shell = PartitionName::parse(&self.shell_partition)
            .map_err(|e| ConfigError::Invalid { field: "shell_partition".into(), reason: e.to_string() })?;
        let tiles = PartitionName::parse(&self.tile_partition)
            .map_err(|e| ConfigError::Invalid { field: "tile_partition".into(), reason: e.to_string() })?;

        Deployment::new(shell, tiles)
            .map_err(|e| ConfigError::Invalid { field: "partitions".into(), reason: e.to_string() })
    }
}
