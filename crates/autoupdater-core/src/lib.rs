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

//! Autoupdater core - keeps extensions installed in a host application on
//! their latest registry versions.
//!
//! Runs on every node of a cluster, while the cluster lock guarantees that
//! only one node discovers and installs updates at a time.

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod lock;
pub mod manifest;
pub mod notification;
pub mod traits;

pub use config::{ConfigOption, DEFAULT_POLL_INTERVAL, EngineConfig};
pub use decision::UpdateDecision;
pub use engine::{EngineBuilder, EngineState, UpdateEngine};
pub use error::{DecisionError, LockError, Result, UpdaterError};
pub use lock::{ClusterLock, FileLock, MemoryLock, MemoryLockStore, UPDATE_LOCK_KEY};
pub use manifest::{CandidateExtension, ExtensionManifest, find_candidate};
pub use notification::{
    Changelog, NotificationReceiver, NotificationSender, UpdateNotification, UpdateOutcome,
};
pub use traits::{ArtifactFetcher, HostApi, Registry};
