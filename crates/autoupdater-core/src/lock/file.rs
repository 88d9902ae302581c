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

//! Advisory file lock on shared storage

use super::ClusterLock;
use crate::error::LockError;
use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    poll_interval: Duration,
    file: Mutex<Option<File>>,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            file: Mutex::new(None),
        }
    }

    /// How often a contended lock is retried
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_acquire(&self) -> Result<bool, LockError> {
        let mut slot = self.file.lock();
        // Held through this handle already; wait for its release
        if slot.is_some() {
            return Ok(false);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| {
                LockError::Backend(format!("cannot open {}: {e}", self.path.display()))
            })?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                *slot = Some(file);
                Ok(true)
            }
            Err(e) if is_contended(&e) => Ok(false),
            Err(e) => Err(LockError::Backend(format!(
                "cannot lock {}: {e}",
                self.path.display()
            ))),
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[async_trait]
impl ClusterLock for FileLock {
    async fn acquire(&self, cancel: &CancellationToken) -> Result<(), LockError> {
        loop {
            if cancel.is_cancelled() {
                return Err(LockError::Cancelled);
            }
            if self.try_acquire()? {
                tracing::debug!("Acquired update lock {}", self.path.display());
                return Ok(());
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(LockError::Cancelled),
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn release(&self) -> Result<(), LockError> {
        let Some(file) = self.file.lock().take() else {
            return Ok(());
        };
        FileExt::unlock(&file).map_err(|e| {
            LockError::Backend(format!("cannot unlock {}: {e}", self.path.display()))
        })
    }
}
