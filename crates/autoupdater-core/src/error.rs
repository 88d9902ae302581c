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

//! Error types for the update engine

use thiserror::Error;

/// Reasons why an installed extension cannot be replaced by a candidate.
#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("extension is restricted from being updated, it is in the skip list")]
    Skipped,

    #[error("extensions are not the same ({installed:?} vs {candidate:?}), it cannot be updated")]
    Mismatch { installed: String, candidate: String },

    #[error("extension has no newer version")]
    NoNewerVersion,

    #[error(
        "min required host version is {required_host_version:?} to install {candidate_version:?} version of {extension_id:?} but host has a lower version {host_version:?}"
    )]
    IncompatibleHost {
        extension_id: String,
        installed_version: String,
        candidate_version: String,
        host_version: String,
        required_host_version: String,
    },

    #[error("invalid {subject} version {value:?}: {source}")]
    VersionParse {
        subject: &'static str,
        value: String,
        #[source]
        source: semver::Error,
    },
}

impl DecisionError {
    /// Skipped and no-newer-version outcomes are the steady state and are
    /// never reported to notification consumers.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Self::Skipped | Self::NoNewerVersion)
    }
}

/// Failures of the cluster-wide lock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Acquisition was abandoned because the engine is stopping.
    #[error("lock acquisition cancelled")]
    Cancelled,

    #[error("lock backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error("registry error: {0}")]
    Registry(String),

    #[error("host error: {0}")]
    Host(String),

    #[error("unable to download the extension: {0}")]
    Download(String),

    #[error("could not install the extension: {0}")]
    Install(String),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("no registry configured")]
    NoRegistry,

    /// `start` was called twice, or a cycle is already running on this engine
    #[error("engine is already running or was started before, construct a new engine instead")]
    AlreadyStarted,
}

pub type Result<T> = std::result::Result<T, UpdaterError>;
