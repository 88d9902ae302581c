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

use crate::error::Result;
use crate::manifest::{CandidateExtension, ExtensionManifest};
use async_trait::async_trait;

/// Extension-management surface of the host application
#[async_trait]
pub trait HostApi: Send + Sync {
    async fn installed_extensions(&self) -> Result<Vec<ExtensionManifest>>;

    /// Install an extension artifact. With `replace` set, an existing
    /// extension with the same id is overwritten.
    async fn install_extension(&self, artifact: Vec<u8>, replace: bool)
    -> Result<ExtensionManifest>;

    async fn host_version(&self) -> Result<String>;

    /// Best-effort informational log line
    fn log_info(&self, message: &str) {
        tracing::info!(target: "host", "{message}");
    }

    /// Best-effort error log line
    fn log_error(&self, message: &str) {
        tracing::error!(target: "host", "{message}");
    }
}

/// Catalog of currently published extension versions
#[async_trait]
pub trait Registry: Send + Sync {
    async fn list_extensions(&self) -> Result<Vec<CandidateExtension>>;
}

/// Fetches extension artifacts from their download location
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
