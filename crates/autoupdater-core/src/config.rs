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

//! Live engine configuration
//!
//! The engine keeps an `Arc<EngineConfig>` behind a lock. Cycles clone the
//! `Arc` and work against that snapshot; `configure` builds a new snapshot
//! from the old one and swaps it in.

use crate::traits::Registry;
use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

/// Wait between the end of one cycle and the start of the next
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3 * 60);

#[derive(Clone)]
pub struct EngineConfig {
    pub registry: Option<Arc<dyn Registry>>,
    pub poll_interval: Duration,
    /// Extension ids that are never updated
    pub skip_list: Arc<BTreeSet<String>>,
    /// Per-cycle cap on concurrent installs; `None` installs everything at once
    pub max_concurrent_installs: Option<NonZeroUsize>,
}

/// One independently settable configuration value.
#[derive(Clone)]
pub enum ConfigOption {
    Registry(Arc<dyn Registry>),
    PollInterval(Duration),
    SkipList(Vec<String>),
    MaxConcurrentInstalls(Option<NonZeroUsize>),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            skip_list: Arc::default(),
            max_concurrent_installs: None,
        }
    }
}

impl EngineConfig {
    /// Returns a new snapshot with `options` merged in. Options not supplied
    /// keep their current value; a zero interval falls back to the default.
    #[must_use]
    pub fn with_options(&self, options: impl IntoIterator<Item = ConfigOption>) -> Self {
        let mut next = self.clone();
        for option in options {
            match option {
                ConfigOption::Registry(registry) => next.registry = Some(registry),
                ConfigOption::PollInterval(interval) => next.poll_interval = interval,
                ConfigOption::SkipList(ids) => next.skip_list = Arc::new(ids.into_iter().collect()),
                ConfigOption::MaxConcurrentInstalls(limit) => next.max_concurrent_installs = limit,
            }
        }
        if next.poll_interval.is_zero() {
            next.poll_interval = DEFAULT_POLL_INTERVAL;
        }
        next
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("registry", &self.registry.as_ref().map(|_| "<registry>"))
            .field("poll_interval", &self.poll_interval)
            .field("skip_list", &self.skip_list)
            .field("max_concurrent_installs", &self.max_concurrent_installs)
            .finish()
    }
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(_) => f.write_str("Registry(..)"),
            Self::PollInterval(interval) => f.debug_tuple("PollInterval").field(interval).finish(),
            Self::SkipList(ids) => f.debug_tuple("SkipList").field(ids).finish(),
            Self::MaxConcurrentInstalls(limit) => f
                .debug_tuple("MaxConcurrentInstalls")
                .field(limit)
                .finish(),
        }
    }
}
