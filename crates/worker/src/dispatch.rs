//! Trigger dispatch.
//!
//! The host delivers one of a closed set of triggers and must await the
//! returned future before treating the trigger as handled.

use std::sync::Arc;

use serde_json::Value;
use tilecache_core::{AppConfig, CacheDb, Classification, Classifier, ConfigError, ControlReply, Deployment, Error, Request};

use crate::control;
use crate::fetch::Network;
use crate::lifecycle::{ActivateReport, InstallReport, Lifecycle};
use crate::strategy::{CacheStrategy, Served};

/// Events the background engine reacts to.
#[derive(Debug, Clone)]
pub enum Trigger {
    Install,
    Activate,
    Intercept(Request),
    Command(Value),
}

/// Completion value of a dispatched trigger.
#[derive(Debug, Clone)]
pub enum Outcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Served { classification: Classification, served: Served },
    /// `None` when the command was not recognised.
    Replied(Option<ControlReply>),
}

/// Routes triggers to the classifier, strategy engine, lifecycle controller
/// and control handler.
#[derive(Clone)]
pub struct Dispatcher {
    db: CacheDb,
    classifier: Classifier,
    strategy: CacheStrategy,
    lifecycle: Lifecycle,
}

impl Dispatcher {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, classifier: Classifier, lifecycle: Lifecycle) -> Self {
        let strategy = CacheStrategy::new(db.clone(), network);
        Self { db, classifier, strategy, lifecycle }
    }

    /// Assemble a dispatcher from validated configuration.
    pub fn from_config(config: &AppConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, ConfigError> {
        let classifier = Classifier::from_config(config)?;
        let lifecycle = Lifecycle::new(db.clone(), network.clone(), config.deployment()?, config.shell_asset_urls()?);
        Ok(Self::new(db, network, classifier, lifecycle))
    }

    pub fn deployment(&self) -> &Deployment {
        self.lifecycle.deployment()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub async fn dispatch(&self, trigger: Trigger) -> Result<Outcome, Error> {
        match trigger {
            Trigger::Install => self.lifecycle.install().await.map(Outcome::Installed),
            Trigger::Activate => self.lifecycle.activate().await.map(Outcome::Activated),
            Trigger::Intercept(request) => {
                let classification = self.classifier.classify_request(&request);
                let served = self.intercept(&request, classification).await?;
                Ok(Outcome::Served { classification, served })
            }
            Trigger::Command(message) => Ok(Outcome::Replied(self.command(&message).await)),
        }
    }

    /// Serve an intercepted request according to its classification.
    pub async fn intercept(&self, request: &Request, classification: Classification) -> Result<Served, Error> {
        match classification.class() {
            Some(class) => {
                let partition = self.deployment().live(class);
                self.strategy.serve(request, partition.as_str()).await
            }
            None => self.strategy.passthrough(request).await,
        }
    }

    pub async fn command(&self, message: &Value) -> Option<ControlReply> {
        control::handle_message(&self.db, self.deployment(), message).await
    }
}
