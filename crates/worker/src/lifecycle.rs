//! Install and activate handling.
//!
//! Install creates both live partitions and populates the application shell
//! best-effort: every asset is fetched concurrently and a failure only loses
//! that asset. The tile partition starts empty. Activate sweeps every
//! partition of a known class that is not its class's live generation. Neither
//! keeps state between triggers; all of it lives in the partitions.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tilecache_core::{CacheDb, Deployment, Error, PartitionClass, Request};
use url::Url;

use crate::fetch::Network;

/// An asset or partition that could not be handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub target: String,
    pub error: String,
}

/// What happened during install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub partition: String,
    pub stored: Vec<String>,
    pub failed: Vec<Failure>,
}

/// What happened during activation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub failed: Vec<Failure>,
}

/// Signal raised when a lifecycle step completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// Supersede the previous engine instance without waiting for its pages.
    SkipWaiting,
    /// Take control of already-open pages immediately.
    ClaimClients,
}

impl InstallReport {
    pub fn signal(&self) -> LifecycleSignal {
        LifecycleSignal::SkipWaiting
    }
}

impl ActivateReport {
    pub fn signal(&self) -> LifecycleSignal {
        LifecycleSignal::ClaimClients
    }
}

/// Owns partition creation and destruction for a deployment.
#[derive(Clone)]
pub struct Lifecycle {
    db: CacheDb,
    network: Arc<dyn Network>,
    deployment: Deployment,
    shell_assets: Vec<Url>,
}

impl Lifecycle {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, deployment: Deployment, shell_assets: Vec<Url>) -> Self {
        Self { db, network, deployment, shell_assets }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// Whether this deployment has not completed an install yet.
    pub async fn needs_install(&self) -> Result<bool, Error> {
        let installed = self.db.installed_deployment().await?;
        Ok(installed.as_deref() != Some(self.deployment.id().as_str()))
    }

    /// Create the live partitions and populate the application shell.
    ///
    /// # Errors
    ///
    /// Fails only if the partition itself cannot be created; individual
    /// asset failures are reported in the returned [`InstallReport`].
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let partition = self.deployment.live(PartitionClass::ApplicationShell).as_str().to_string();
        self.db.open_partition(&partition).await?;
        self.db
            .open_partition(self.deployment.live(PartitionClass::TileImagery).as_str())
            .await?;

        tracing::info!(partition = %partition, assets = self.shell_assets.len(), "installing application shell");

        let attempts = self
            .shell_assets
            .iter()
            .map(|url| self.populate(&partition, url.clone()));
        let results = join_all(attempts).await;

        let mut report = InstallReport { partition, stored: Vec::new(), failed: Vec::new() };
        for (url, result) in self.shell_assets.iter().zip(results) {
            match result {
                Ok(()) => report.stored.push(url.to_string()),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "failed to cache shell asset");
                    report.failed.push(Failure { target: url.to_string(), error: e.to_string() });
                }
            }
        }

        self.db.record_installed_deployment(&self.deployment.id()).await?;

        tracing::info!(
            partition = %report.partition,
            stored = report.stored.len(),
            failed = report.failed.len(),
            "install complete"
        );

        Ok(report)
    }

    async fn populate(&self, partition: &str, url: Url) -> Result<(), Error> {
        let request = Request::get(url);
        let response = self.network.fetch(&request).await?;
        if !response.is_ok() {
            return Err(Error::Network(format!("status {}", response.status)));
        }
        self.db.put_entry(partition, &request, &response).await
    }

    /// Delete every stale-generation partition.
    ///
    /// # Errors
    ///
    /// Fails only if the partition list cannot be read; individual deletion
    /// failures are reported in the returned [`ActivateReport`].
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let stale: Vec<String> = self
            .db
            .partition_names()
            .await?
            .into_iter()
            .filter(|name| self.deployment.is_stale(name))
            .collect();

        let deletions = stale.iter().map(|name| self.db.delete_partition(name));
        let results = join_all(deletions).await;

        let mut report = ActivateReport { deleted: Vec::new(), failed: Vec::new() };
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    tracing::info!(partition = %name, "deleted stale partition");
                    report.deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(partition = %name, error = %e, "failed to delete stale partition");
                    report.failed.push(Failure { target: name, error: e.to_string() });
                }
            }
        }

        Ok(report)
    }
}
