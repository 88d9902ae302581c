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

//! Cluster-wide mutual exclusion around update cycles

mod file;
mod memory;

pub use file::FileLock;
pub use memory::{MemoryLock, MemoryLockStore};

use crate::error::LockError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Key under which update cycles are serialized across nodes
pub const UPDATE_LOCK_KEY: &str = "autoupdater:updater";

/// A mutual-exclusion primitive with a single holder per key, visible to
/// every node of the cluster.
#[async_trait]
pub trait ClusterLock: Send + Sync {
    /// Wait until the lock is held or `cancel` fires. Cancellation is
    /// reported as [`LockError::Cancelled`], never as a backend failure.
    async fn acquire(&self, cancel: &CancellationToken) -> Result<(), LockError>;

    /// Release a lock obtained by `acquire`. Releasing a lock that is not
    /// held is a no-op.
    async fn release(&self) -> Result<(), LockError>;
}
