// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Autoupdater.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Update engine that keeps installed extensions on their latest versions
//!
//! One cycle runs at a time per node, and the cluster lock serializes cycles
//! across nodes. The lock is held from discovery until every install of the
//! cycle has finished, then released before the engine sleeps.

use crate::config::{ConfigOption, EngineConfig};
use crate::decision::UpdateDecision;
use crate::error::{LockError, Result, UpdaterError};
use crate::lock::ClusterLock;
use crate::manifest::{ExtensionManifest, find_candidate};
use crate::notification::{NotificationSender, UpdateNotification};
use crate::traits::{ArtifactFetcher, HostApi};
use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lifecycle of an engine instance. `run_once` returns `Running` to `Idle`;
/// every other transition moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

pub struct UpdateEngine {
    host: Arc<dyn HostApi>,
    fetcher: Arc<dyn ArtifactFetcher>,
    lock: Arc<dyn ClusterLock>,
    config: RwLock<Arc<EngineConfig>>,
    /// Fixed at construction; taken (and so closed) when `start` returns
    notifications: Mutex<Option<NotificationSender>>,
    cancel: CancellationToken,
    state: watch::Sender<EngineState>,
    started: AtomicBool,
}

enum Claim {
    Claimed,
    Busy,
    Stopped,
}

pub struct EngineBuilder {
    host: Arc<dyn HostApi>,
    fetcher: Arc<dyn ArtifactFetcher>,
    lock: Arc<dyn ClusterLock>,
    notifications: Option<NotificationSender>,
    options: Vec<ConfigOption>,
}

impl EngineBuilder {
    /// Where update notifications are sent. Cannot be changed after `build`.
    #[must_use]
    pub fn notifications(mut self, sender: NotificationSender) -> Self {
        self.notifications = Some(sender);
        self
    }

    #[must_use]
    pub fn option(mut self, option: ConfigOption) -> Self {
        self.options.push(option);
        self
    }

    #[must_use]
    pub fn options(mut self, options: impl IntoIterator<Item = ConfigOption>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn build(self) -> UpdateEngine {
        let config = EngineConfig::default().with_options(self.options);
        let (state, _) = watch::channel(EngineState::Idle);

        UpdateEngine {
            host: self.host,
            fetcher: self.fetcher,
            lock: self.lock,
            config: RwLock::new(Arc::new(config)),
            notifications: Mutex::new(self.notifications),
            cancel: CancellationToken::new(),
            state,
            started: AtomicBool::new(false),
        }
    }
}

impl UpdateEngine {
    pub fn builder(
        host: Arc<dyn HostApi>,
        fetcher: Arc<dyn ArtifactFetcher>,
        lock: Arc<dyn ClusterLock>,
    ) -> EngineBuilder {
        EngineBuilder {
            host,
            fetcher,
            lock,
            notifications: None,
            options: Vec::new(),
        }
    }

    /// Merge `options` into the live configuration. Safe to call while a
    /// cycle is running; the running cycle keeps the snapshot it started with.
    pub fn configure(&self, options: impl IntoIterator<Item = ConfigOption>) {
        let mut config = self.config.write();
        *config = Arc::new(config.with_options(options));
    }

    pub fn config(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.config.read())
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Run update cycles until stopped.
    ///
    /// Returns `Ok` once cancellation is observed and an error only when the
    /// lock backend fails. The notification channel is closed before this
    /// returns. An engine can be started once; an engine stopped before it
    /// was started returns `Ok` without running a cycle.
    pub async fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(UpdaterError::AlreadyStarted);
        }
        match self.claim() {
            Claim::Claimed => {}
            Claim::Stopped => return Ok(()),
            Claim::Busy => {
                self.started.store(false, Ordering::Release);
                return Err(UpdaterError::AlreadyStarted);
            }
        }

        let result = self.poll().await;

        self.notifications.lock().take();
        self.state.send_replace(EngineState::Stopped);
        result
    }

    /// Signal cancellation and return immediately. An in-flight cycle is not
    /// interrupted. Stopping an engine that is not running moves it straight
    /// to `Stopped` and closes the notification channel.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.state.send_if_modified(|state| match *state {
            EngineState::Running => {
                *state = EngineState::Stopping;
                true
            }
            EngineState::Idle => {
                self.notifications.lock().take();
                *state = EngineState::Stopped;
                true
            }
            EngineState::Stopping | EngineState::Stopped => false,
        });
    }

    /// Signal cancellation and wait until the in-flight cycle has finished
    /// and the notification channel is closed.
    pub async fn stop_and_wait(&self) {
        self.stop();
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == EngineState::Stopped).await;
    }

    /// Run a single locked cycle outside the polling loop.
    ///
    /// Fails with `AlreadyStarted` while `start` or another `run_once` is
    /// running a cycle on this engine. A stop observed while waiting for the
    /// lock ends the call without running the cycle.
    pub async fn run_once(&self) -> Result<()> {
        match self.claim() {
            Claim::Claimed => {}
            Claim::Stopped => return Ok(()),
            Claim::Busy => return Err(UpdaterError::AlreadyStarted),
        }

        let result = match self.lock.acquire(&self.cancel).await {
            Ok(()) => {
                self.check_and_update().await;
                self.release_lock().await;
                Ok(())
            }
            Err(LockError::Cancelled) => Ok(()),
            Err(e) => Err(e.into()),
        };

        // A stop requested meanwhile is final
        self.state.send_modify(|state| {
            if *state == EngineState::Stopping {
                self.notifications.lock().take();
                *state = EngineState::Stopped;
            } else {
                *state = EngineState::Idle;
            }
        });
        result
    }

    /// Move `Idle` to `Running`, reporting what stood in the way otherwise
    fn claim(&self) -> Claim {
        let mut claim = Claim::Busy;
        self.state.send_if_modified(|state| match *state {
            EngineState::Idle => {
                *state = EngineState::Running;
                claim = Claim::Claimed;
                true
            }
            EngineState::Stopped => {
                claim = Claim::Stopped;
                false
            }
            EngineState::Running | EngineState::Stopping => false,
        });
        claim
    }

    async fn poll(&self) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            match self.lock.acquire(&self.cancel).await {
                Ok(()) => {}
                Err(LockError::Cancelled) => return Ok(()),
                Err(e) => {
                    self.host
                        .log_error(&format!("cannot acquire the update lock: {e}"));
                    return Err(e.into());
                }
            }

            self.check_and_update().await;
            self.release_lock().await;

            // A pending stop wins over starting a new wait
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let interval = self.config().poll_interval;
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    async fn release_lock(&self) {
        if let Err(e) = self.lock.release().await {
            warn!("Failed to release update lock: {e}");
        }
    }

    async fn check_and_update(&self) {
        let config = self.config();

        self.host.log_info("checking for new versions...");
        let updates = self.discover(&config).await;
        if updates.is_empty() {
            self.host.log_info("no new versions found");
            return;
        }
        self.host
            .log_info(&format!("found {} extensions to update", updates.len()));

        let limit = config
            .max_concurrent_installs
            .map_or(updates.len(), NonZeroUsize::get);

        stream::iter(updates)
            .map(|decision| self.update(decision))
            .buffer_unordered(limit)
            .collect::<Vec<()>>()
            .await;
    }

    async fn discover(&self, config: &EngineConfig) -> Vec<UpdateDecision> {
        let installed = match self.host.installed_extensions().await {
            Ok(installed) => installed,
            Err(e) => {
                self.host
                    .log_error(&format!("cannot get a list of installed extensions: {e}"));
                return Vec::new();
            }
        };
        self.host
            .log_info(&format!("found {} installed extensions", installed.len()));
        if installed.is_empty() {
            return Vec::new();
        }

        let Some(registry) = config.registry.as_ref() else {
            self.host.log_error(&format!(
                "cannot check for new versions: {}",
                UpdaterError::NoRegistry
            ));
            return Vec::new();
        };
        let candidates = match registry.list_extensions().await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.host.log_error(&format!(
                    "cannot get a list of extensions from the registry: {e}"
                ));
                return Vec::new();
            }
        };
        self.host.log_info(&format!(
            "found {} extensions in the registry",
            candidates.len()
        ));

        let host_version = match self.host.host_version().await {
            Ok(version) => version,
            Err(e) => {
                self.host
                    .log_error(&format!("cannot get the host version: {e}"));
                return Vec::new();
            }
        };

        let mut updates = Vec::new();
        for manifest in installed {
            let Some(candidate) = find_candidate(&candidates, &manifest.id) else {
                debug!("{} is not offered by the registry", manifest.id);
                continue;
            };
            let id = manifest.id.clone();

            let decision = match UpdateDecision::new(
                manifest,
                candidate.clone(),
                Arc::clone(&config.skip_list),
                host_version.clone(),
            ) {
                Ok(decision) => decision,
                Err(e) => {
                    self.notify(UpdateNotification::failed(id, e)).await;
                    continue;
                }
            };

            match decision.check() {
                Ok(()) => updates.push(decision),
                Err(e) if !e.is_actionable() => debug!("Not updating {id}: {e}"),
                Err(e) => self.notify(UpdateNotification::failed(id, e)).await,
            }
        }
        updates
    }

    async fn update(&self, decision: UpdateDecision) {
        let id = decision.installed().id.clone();
        self.host.log_info(&format!(
            "updating {id:?} from {:?} to {:?}...",
            decision.installed().version,
            decision.candidate().manifest.version
        ));

        match self.install(&decision.candidate().download_url).await {
            Ok(manifest) => {
                self.host.log_info(&format!("updated {id:?}"));
                debug!("Host reports {} at {}", manifest.id, manifest.version);
                self.notify(UpdateNotification::updated(id, decision.changelog()))
                    .await;
            }
            Err(e) => {
                self.host
                    .log_error(&format!("could not update {id:?}: {e}"));
                self.notify(UpdateNotification::failed(id, e)).await;
            }
        }
    }

    async fn install(&self, download_url: &str) -> Result<ExtensionManifest> {
        let artifact = self.fetcher.fetch(download_url).await?;
        self.host
            .install_extension(artifact, true)
            .await
            .map_err(|e| match e {
                UpdaterError::Install(_) => e,
                other => UpdaterError::Install(other.to_string()),
            })
    }

    async fn notify(&self, notification: UpdateNotification) {
        let sender = self.notifications.lock().clone();
        let Some(sender) = sender else {
            return;
        };
        if sender.send(notification).await.is_err() {
            debug!("Notification receiver dropped, discarding notification");
        }
    }
}

impl fmt::Debug for UpdateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateEngine")
            .field("config", &self.config())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("notifications", &self.notifications.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
