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

//! Update outcome events and the channel that carries them
//!
//! The engine owns the sending half. It is dropped exactly once, after the
//! polling loop has exited, so a receiver observing `None` knows the engine
//! is fully stopped.

use crate::error::UpdaterError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 32;

pub type NotificationSender = mpsc::Sender<UpdateNotification>;
pub type NotificationReceiver = mpsc::Receiver<UpdateNotification>;

/// Create a bounded notification conduit.
pub fn channel(capacity: usize) -> (NotificationSender, NotificationReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Before/after summary of a successful update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changelog {
    pub updated_name: String,
    pub updated_description: String,
    pub previous_version: String,
    pub updated_version: String,
}

#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Changelog),
    Failed(UpdaterError),
}

/// Emitted once per attempted update or actionable decision failure.
#[derive(Debug)]
pub struct UpdateNotification {
    pub extension_id: String,
    pub outcome: UpdateOutcome,
    pub occurred_at: DateTime<Utc>,
}

impl UpdateNotification {
    pub fn updated(extension_id: impl Into<String>, changelog: Changelog) -> Self {
        Self {
            extension_id: extension_id.into(),
            outcome: UpdateOutcome::Updated(changelog),
            occurred_at: Utc::now(),
        }
    }

    pub fn failed(extension_id: impl Into<String>, error: impl Into<UpdaterError>) -> Self {
        Self {
            extension_id: extension_id.into(),
            outcome: UpdateOutcome::Failed(error.into()),
            occurred_at: Utc::now(),
        }
    }

    pub fn changelog(&self) -> Option<&Changelog> {
        match &self.outcome {
            UpdateOutcome::Updated(changelog) => Some(changelog),
            UpdateOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&UpdaterError> {
        match &self.outcome {
            UpdateOutcome::Failed(error) => Some(error),
            UpdateOutcome::Updated(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, UpdateOutcome::Updated(_))
    }
}

impl fmt::Display for UpdateNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            UpdateOutcome::Updated(changelog) => write!(
                f,
                "{} updated from {} to {}",
                self.extension_id, changelog.previous_version, changelog.updated_version
            ),
            UpdateOutcome::Failed(error) => {
                write!(f, "{} could not be updated: {error}", self.extension_id)
            }
        }
    }
}
