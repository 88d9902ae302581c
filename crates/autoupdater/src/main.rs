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

//! Autoupdater - keeps the extensions of a host application on their latest
//! registry versions.
//!
//! Every node of a cluster runs one instance; the lock file configured under
//! `[lock]` makes sure only one of them updates at a time.

mod config;
mod host;
mod notifier;

use anyhow::{Context, Result};
use autoupdater_core::notification::{DEFAULT_NOTIFICATION_CAPACITY, channel};
use autoupdater_core::{
    ClusterLock, FileLock, MemoryLockStore, NotificationSender, UPDATE_LOCK_KEY, UpdateEngine,
};
use autoupdater_registry::HttpArtifactFetcher;
use clap::Parser;
use config::Settings;
use host::HttpHost;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "autoupdater", version, about)]
struct Args {
    /// Path to the TOML settings file
    #[arg(short, long, default_value = "autoupdater.toml")]
    config: PathBuf,

    /// Run a single update cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("Starting autoupdater {}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::from_file(&args.config)?;
    let (tx, rx) = channel(DEFAULT_NOTIFICATION_CAPACITY);
    let engine = Arc::new(build_engine(&settings, tx)?);
    info!("Loaded config: {:?}", engine.config());

    let notifier = tokio::spawn(notifier::run(rx));

    if args.once {
        let result = engine.run_once().await;
        // Dropping the engine closes the notification channel
        drop(engine);
        notifier.await?;
        return result.context("update cycle failed");
    }

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.start().await })
    };
    let signals = tokio::spawn(handle_signals(Arc::clone(&engine), args.config));

    let result = runner.await?;
    signals.abort();
    notifier.await?;

    result.context("update engine stopped with an error")?;
    info!("Shutting down");
    Ok(())
}

fn build_engine(settings: &Settings, notifications: NotificationSender) -> Result<UpdateEngine> {
    let host = HttpHost::new(settings.host.url.as_str(), settings.host.resolved_token())
        .context("Failed to create host client")?;
    let fetcher = HttpArtifactFetcher::with_timeout(settings.updater.download_timeout())
        .context("Failed to create artifact fetcher")?;

    if !settings.lock.is_cluster_wide() {
        warn!(
            "No [lock] path configured, the update lock only covers this process; \
             nodes sharing a host will update concurrently"
        );
    }
    let lock: Arc<dyn ClusterLock> = match &settings.lock.path {
        Some(path) => {
            info!("Using lock file {}", path.display());
            Arc::new(FileLock::new(path))
        }
        None => Arc::new(MemoryLockStore::new().lock(UPDATE_LOCK_KEY)),
    };

    Ok(
        UpdateEngine::builder(Arc::new(host), Arc::new(fetcher), lock)
            .notifications(notifications)
            .options(settings.to_options()?)
            .build(),
    )
}

/// SIGINT and SIGTERM stop the engine, SIGHUP reloads the settings file
async fn handle_signals(engine: Arc<UpdateEngine>, config_path: PathBuf) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for SIGINT")?;
                info!("SIGINT received, waiting for the running cycle to finish");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, waiting for the running cycle to finish");
                break;
            }
            _ = sighup.recv() => {
                info!("SIGHUP received, reloading {}", config_path.display());
                reload(&engine, &config_path);
            }
        }
    }

    engine.stop_and_wait().await;
    Ok(())
}

fn reload(engine: &UpdateEngine, config_path: &std::path::Path) {
    let options = Settings::from_file(config_path).and_then(|settings| settings.to_options());
    match options {
        Ok(options) => {
            engine.configure(options);
            info!("Config reloaded: {:?}", engine.config());
        }
        Err(e) => error!("Keeping the current config, reload failed: {e:#}"),
    }
}
