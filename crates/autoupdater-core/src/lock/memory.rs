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

//! Process-local lock store
//!
//! Every [`MemoryLock`] created from the same store competes for the same
//! keys, so several engines sharing one store behave like cluster nodes.

use super::ClusterLock;
use crate::error::LockError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct StoreInner {
    held: Mutex<HashSet<String>>,
    released: Notify,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLockStore {
    inner: Arc<StoreInner>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lock handle for `key` backed by this store
    pub fn lock(&self, key: impl Into<String>) -> MemoryLock {
        MemoryLock {
            store: self.clone(),
            key: key.into(),
            held: AtomicBool::new(false),
        }
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.inner.held.lock().contains(key)
    }
}

#[derive(Debug)]
pub struct MemoryLock {
    store: MemoryLockStore,
    key: String,
    held: AtomicBool,
}

impl MemoryLock {
    /// Not re-entrant: a handle that already holds the key waits like any
    /// other contender
    fn try_acquire(&self) -> bool {
        let acquired = self.store.inner.held.lock().insert(self.key.clone());
        if acquired {
            self.held.store(true, Ordering::Release);
        }
        acquired
    }
}

#[async_trait]
impl ClusterLock for MemoryLock {
    async fn acquire(&self, cancel: &CancellationToken) -> Result<(), LockError> {
        loop {
            if cancel.is_cancelled() {
                return Err(LockError::Cancelled);
            }

            // Register for wakeups before checking so a release in between is not missed
            let released = self.store.inner.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            if self.try_acquire() {
                return Ok(());
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(LockError::Cancelled),
                () = &mut released => {}
            }
        }
    }

    async fn release(&self) -> Result<(), LockError> {
        if self.held.swap(false, Ordering::AcqRel) {
            self.store.inner.held.lock().remove(&self.key);
            self.store.inner.released.notify_waiters();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let store = MemoryLockStore::new();
        let lock = store.lock("updater");
        let cancel = CancellationToken::new();

        lock.acquire(&cancel).await.unwrap();
        assert!(store.is_held("updater"));

        lock.release().await.unwrap();
        assert!(!store.is_held("updater"));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let store = MemoryLockStore::new();
        let first = store.lock("updater");
        let second = store.lock("updater");
        let cancel = CancellationToken::new();

        first.acquire(&cancel).await.unwrap();
        first.release().await.unwrap();
        second.acquire(&cancel).await.unwrap();

        // A stale release from the previous holder must not free the lock
        first.release().await.unwrap();
        assert!(store.is_held("updater"));
    }

    #[tokio::test]
    async fn test_second_holder_waits_for_release() {
        let store = MemoryLockStore::new();
        let first = store.lock("updater");
        let second = Arc::new(store.lock("updater"));
        let cancel = CancellationToken::new();

        first.acquire(&cancel).await.unwrap();

        let waiter = {
            let second = Arc::clone(&second);
            let cancel = cancel.clone();
            tokio::spawn(async move { second.acquire(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.release().await.unwrap();
        let acquired = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(acquired.is_ok());
        assert!(store.is_held("updater"));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let store = MemoryLockStore::new();
        let first = store.lock("updater");
        let second = store.lock("updater");
        let cancel = CancellationToken::new();

        first.acquire(&CancellationToken::new()).await.unwrap();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        assert_eq!(second.acquire(&cancel).await, Err(LockError::Cancelled));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_token_never_acquires() {
        let store = MemoryLockStore::new();
        let lock = store.lock("updater");
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(lock.acquire(&cancel).await, Err(LockError::Cancelled));
        assert!(!store.is_held("updater"));
    }

    #[tokio::test]
    async fn test_held_handle_waits_for_its_own_release() {
        let store = MemoryLockStore::new();
        let lock = Arc::new(store.lock("updater"));
        let cancel = CancellationToken::new();

        lock.acquire(&cancel).await.unwrap();

        let again = {
            let lock = Arc::clone(&lock);
            let cancel = cancel.clone();
            tokio::spawn(async move { lock.acquire(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!again.is_finished(), "second acquire entered a held lock");

        lock.release().await.unwrap();
        let acquired = tokio::time::timeout(Duration::from_secs(1), again)
            .await
            .unwrap()
            .unwrap();
        assert!(acquired.is_ok());
        assert!(store.is_held("updater"));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryLockStore::new();
        let cancel = CancellationToken::new();

        store.lock("a").acquire(&cancel).await.unwrap();
        store.lock("b").acquire(&cancel).await.unwrap();

        assert!(store.is_held("a"));
        assert!(store.is_held("b"));
    }
}
