//! Background engine host.
//!
//! The host owns a task that receives triggers over a channel. Each trigger
//! carries a oneshot sender so its completion (or control reply) goes back to
//! whoever sent it.
//!
//! Install and Activate are awaited inside the receive loop, so nothing queued
//! behind them runs until they finish. Intercepts and commands run as their own
//! tasks: a stalled fetch only holds up its own request.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tilecache_core::{Classification, ControlMessage, ControlReply, Error, Request};
use tokio::sync::{RwLock, mpsc, oneshot};

use crate::dispatch::{Dispatcher, Outcome, Trigger};
use crate::lifecycle::{ActivateReport, InstallReport, LifecycleSignal};
use crate::strategy::Served;

const QUEUE_DEPTH: usize = 256;

/// Lifecycle position of the hosted engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

struct Envelope {
    trigger: Trigger,
    reply: oneshot::Sender<Result<Outcome, Error>>,
}

/// Result of bringing a deployment up.
#[derive(Debug, Clone, Serialize)]
pub struct Startup {
    /// `None` when this deployment was already installed.
    pub installed: Option<InstallReport>,
    pub activated: ActivateReport,
}

/// Cloneable sender side of the host; the foreground's way in.
#[derive(Clone)]
pub struct HostHandle {
    tx: mpsc::Sender<Envelope>,
    state: Arc<RwLock<EngineState>>,
}

pub struct Host;

impl Host {
    /// Spawn the host task on the current runtime.
    pub fn spawn(dispatcher: Dispatcher) -> HostHandle {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let state = Arc::new(RwLock::new(EngineState::Parsed));
        tokio::spawn(run(Arc::new(dispatcher), rx, state.clone()));
        HostHandle { tx, state }
    }

    /// Spawn the host and bring the deployment up.
    ///
    /// Install runs only if this deployment has not completed one before;
    /// Activate runs every time.
    pub async fn start(dispatcher: Dispatcher) -> Result<(HostHandle, Startup), Error> {
        let needs_install = dispatcher.lifecycle().needs_install().await?;
        let handle = Self::spawn(dispatcher);

        let installed = if needs_install {
            match handle.send(Trigger::Install).await? {
                Outcome::Installed(report) => Some(report),
                other => return Err(unexpected(&other)),
            }
        } else {
            tracing::info!("deployment already installed");
            *handle.state.write().await = EngineState::Installed;
            None
        };

        let activated = match handle.send(Trigger::Activate).await? {
            Outcome::Activated(report) => report,
            other => return Err(unexpected(&other)),
        };

        Ok((handle, Startup { installed, activated }))
    }
}

fn unexpected(outcome: &Outcome) -> Error {
    Error::InvalidInput(format!("unexpected outcome: {outcome:?}"))
}

async fn run(dispatcher: Arc<Dispatcher>, mut rx: mpsc::Receiver<Envelope>, state: Arc<RwLock<EngineState>>) {
    while let Some(Envelope { trigger, reply }) = rx.recv().await {
        match trigger {
            Trigger::Install => {
                *state.write().await = EngineState::Installing;
                let result = dispatcher.dispatch(Trigger::Install).await;
                let next = match &result {
                    Ok(Outcome::Installed(report)) => {
                        tracing::info!(signal = ?report.signal(), "install finished");
                        EngineState::Installed
                    }
                    _ => EngineState::Parsed,
                };
                *state.write().await = next;
                let _ = reply.send(result);
            }
            Trigger::Activate => {
                *state.write().await = EngineState::Activating;
                let result = dispatcher.dispatch(Trigger::Activate).await;
                match &result {
                    Ok(Outcome::Activated(report)) => {
                        tracing::info!(signal = ?report.signal(), deleted = report.deleted.len(), "activated");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "activation sweep failed"),
                }
                *state.write().await = EngineState::Activated;
                tracing::debug!(signal = ?LifecycleSignal::ClaimClients, "controlling open clients");
                let _ = reply.send(result);
            }
            trigger => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    let result = dispatcher.dispatch(trigger).await;
                    let _ = reply.send(result);
                });
            }
        }
    }
    tracing::debug!("host channel closed");
}

impl HostHandle {
    /// Deliver a trigger and wait for its completion.
    pub async fn send(&self, trigger: Trigger) -> Result<Outcome, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { trigger, reply })
            .await
            .map_err(|_| Error::EngineStopped)?;
        rx.await.map_err(|_| Error::EngineStopped)?
    }

    /// Route a request through the engine as if the page had issued it.
    pub async fn fetch(&self, request: Request) -> Result<(Classification, Served), Error> {
        match self.send(Trigger::Intercept(request)).await? {
            Outcome::Served { classification, served } => Ok((classification, served)),
            other => Err(unexpected(&other)),
        }
    }

    /// Post a raw control message; `None` means it went unanswered.
    pub async fn post_message(&self, message: Value) -> Result<Option<ControlReply>, Error> {
        match self.send(Trigger::Command(message)).await? {
            Outcome::Replied(reply) => Ok(reply),
            other => Err(unexpected(&other)),
        }
    }

    /// Ask the engine to delete all downloaded tiles.
    pub async fn delete_tile_cache(&self) -> Result<ControlReply, Error> {
        let message = serde_json::to_value(ControlMessage::DeleteCache)
            .map_err(|e| Error::InvalidInput(format!("failed to encode message: {e}")))?;
        self.post_message(message)
            .await?
            .ok_or_else(|| Error::InvalidInput("deleteCache was not acknowledged".into()))
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::scripted::ScriptedNetwork;
    use crate::lifecycle::Lifecycle;
    use tilecache_core::{CacheDb, Classifier, Deployment};
    use url::Url;

    async fn dispatcher(db: CacheDb, network: ScriptedNetwork, deployment: Deployment) -> Dispatcher {
        let network = Arc::new(network);
        let origin = Url::parse("https://maps.example.com").unwrap();
        let classifier =
            Classifier::new("https://tile.example.org/", "https://unpkg.com/", vec!["/index.html".into()], &origin);
        let lifecycle =
            Lifecycle::new(db.clone(), network.clone(), deployment, vec![origin.join("/index.html").unwrap()]);
        Dispatcher::new(db, network, classifier, lifecycle)
    }

    #[tokio::test]
    async fn test_start_installs_and_activates() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = ScriptedNetwork::new().ok("https://maps.example.com/index.html", b"<html>");

        let (handle, startup) = Host::start(dispatcher(db.clone(), network, Deployment::default()).await)
            .await
            .unwrap();

        assert_eq!(handle.state().await, EngineState::Activated);
        assert_eq!(startup.installed.unwrap().stored.len(), 1);
        assert!(db.has_partition("appshell-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_restart_skips_install() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = ScriptedNetwork::new().ok("https://maps.example.com/index.html", b"<html>");
        Host::start(dispatcher(db.clone(), first, Deployment::default()).await)
            .await
            .unwrap();

        let (handle, startup) = Host::start(dispatcher(db.clone(), ScriptedNetwork::new(), Deployment::default()).await)
            .await
            .unwrap();

        assert!(startup.installed.is_none());
        assert_eq!(handle.state().await, EngineState::Activated);
    }

    #[tokio::test]
    async fn test_generation_bump_reinstalls_and_sweeps() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = || ScriptedNetwork::new().ok("https://maps.example.com/index.html", b"<html>");
        Host::start(dispatcher(db.clone(), network(), Deployment::default()).await)
            .await
            .unwrap();

        let bumped = Deployment::with_generations(2, 2).unwrap();
        let (_handle, startup) = Host::start(dispatcher(db.clone(), network(), bumped).await)
            .await
            .unwrap();

        assert!(startup.installed.is_some());
        let mut names = db.partition_names().await.unwrap();
        names.sort();
        assert_eq!(names, vec!["appshell-v2".to_string(), "tiles-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_tile_cache_round_trip() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = Host::spawn(dispatcher(db.clone(), ScriptedNetwork::new(), Deployment::default()).await);
        db.open_partition("tiles-v1").await.unwrap();

        let reply = handle.delete_tile_cache().await.unwrap();

        assert_eq!(reply, ControlReply::CacheDeleted);
        assert!(!db.has_partition("tiles-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_unrecognised_message_unanswered() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let handle = Host::spawn(dispatcher(db, ScriptedNetwork::new(), Deployment::default()).await);

        let reply = handle.post_message(serde_json::json!({"action": "rebuild"})).await.unwrap();
        assert_eq!(reply, None);
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_to_caller() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let tile = "https://tile.example.org/1/0/0.png";
        let network = ScriptedNetwork::new().fail(tile, "offline");
        let handle = Host::spawn(dispatcher(db, network, Deployment::default()).await);

        let result = handle.fetch(Request::parse(tile).unwrap()).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
