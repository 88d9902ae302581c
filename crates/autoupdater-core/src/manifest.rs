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

//! Extension identity as reported by the host and the registry

use serde::{Deserialize, Serialize};

/// Snapshot of one extension's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExtensionManifest {
    /// Unique identifier, the join key between installed and candidate extensions
    pub id: String,

    /// Semantic version string
    pub version: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Minimum host version this extension runs on
    #[serde(
        default,
        alias = "min_server_version",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_host_version: Option<String>,
}

impl ExtensionManifest {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            ..Default::default()
        }
    }
}

/// An extension offered by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateExtension {
    pub manifest: ExtensionManifest,
    pub download_url: String,
}

impl CandidateExtension {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }
}

/// First candidate published under `id`, if the registry offers one.
pub fn find_candidate<'a>(
    candidates: &'a [CandidateExtension],
    id: &str,
) -> Option<&'a CandidateExtension> {
    candidates.iter().find(|c| c.id() == id)
}
