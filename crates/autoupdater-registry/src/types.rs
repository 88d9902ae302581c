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

//! Registry wire format

use autoupdater_core::{CandidateExtension, ExtensionManifest};
use serde::{Deserialize, Serialize};

/// One entry of the registry listing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryEntry {
    #[serde(default)]
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes_url: Option<String>,
    #[serde(default)]
    pub manifest: Option<ExtensionManifest>,
}

impl RegistryEntry {
    /// Entries without a manifest describe nothing installable
    pub fn into_candidate(self) -> Option<CandidateExtension> {
        let manifest = self.manifest?;
        Some(CandidateExtension {
            manifest,
            download_url: self.download_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_with_marketplace_fields() {
        let entry: RegistryEntry = serde_json::from_value(json!({
            "homepage_url": "https://example.com/antivirus",
            "download_url": "https://example.com/antivirus-1.5.1.tar.gz",
            "release_notes_url": "https://example.com/antivirus/releases/1.5.1",
            "labels": [{"name": "Community"}],
            "manifest": {
                "id": "antivirus",
                "name": "Antivirus",
                "description": "Scans uploaded files",
                "version": "1.5.1",
                "min_server_version": "5.6.0"
            }
        }))
        .unwrap();

        let candidate = entry.into_candidate().unwrap();
        assert_eq!(candidate.id(), "antivirus");
        assert_eq!(
            candidate.download_url,
            "https://example.com/antivirus-1.5.1.tar.gz"
        );
        assert_eq!(
            candidate.manifest.min_host_version.as_deref(),
            Some("5.6.0")
        );
    }

    #[test]
    fn test_entry_without_manifest() {
        let entry: RegistryEntry = serde_json::from_value(json!({
            "download_url": "https://example.com/broken.tar.gz",
            "manifest": null
        }))
        .unwrap();

        assert!(entry.into_candidate().is_none());
    }
}
