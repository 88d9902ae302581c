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

//! Eligibility decision between an installed extension and a registry candidate

use crate::error::DecisionError;
use crate::manifest::{CandidateExtension, ExtensionManifest};
use crate::notification::Changelog;
use semver::Version;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Parse a strict semantic version, tagging failures with what was parsed
pub fn parse_version(subject: &'static str, value: &str) -> Result<Version, DecisionError> {
    Version::parse(value).map_err(|source| DecisionError::VersionParse {
        subject,
        value: value.to_string(),
        source,
    })
}

/// Semantic-version precedence; build metadata does not take part.
pub fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

/// Compares one installed extension against one registry candidate.
///
/// Lives for a single cycle: built during discovery, checked, and if eligible
/// consumed by the install step.
#[derive(Debug, Clone)]
pub struct UpdateDecision {
    installed: ExtensionManifest,
    installed_version: Version,
    candidate: CandidateExtension,
    candidate_version: Version,
    skip_list: Arc<BTreeSet<String>>,
    host_version: String,
}

impl UpdateDecision {
    pub fn new(
        installed: ExtensionManifest,
        candidate: CandidateExtension,
        skip_list: Arc<BTreeSet<String>>,
        host_version: impl Into<String>,
    ) -> Result<Self, DecisionError> {
        let installed_version = parse_version("installed", &installed.version)?;
        let candidate_version = parse_version("candidate", &candidate.manifest.version)?;

        Ok(Self {
            installed,
            installed_version,
            candidate,
            candidate_version,
            skip_list,
            host_version: host_version.into(),
        })
    }

    /// Checks run cheapest first; the first failure wins.
    pub fn check(&self) -> Result<(), DecisionError> {
        self.require_not_skipped()?;
        self.require_same_extension()?;
        self.require_newer_version()?;
        self.require_compatible_host()
    }

    pub fn installed(&self) -> &ExtensionManifest {
        &self.installed
    }

    pub fn candidate(&self) -> &CandidateExtension {
        &self.candidate
    }

    pub fn changelog(&self) -> Changelog {
        Changelog {
            updated_name: self.candidate.manifest.name.clone(),
            updated_description: self.candidate.manifest.description.clone(),
            previous_version: self.installed.version.clone(),
            updated_version: self.candidate.manifest.version.clone(),
        }
    }

    fn require_not_skipped(&self) -> Result<(), DecisionError> {
        if self.skip_list.contains(&self.installed.id) {
            return Err(DecisionError::Skipped);
        }
        Ok(())
    }

    fn require_same_extension(&self) -> Result<(), DecisionError> {
        if self.installed.id != self.candidate.manifest.id {
            return Err(DecisionError::Mismatch {
                installed: self.installed.id.clone(),
                candidate: self.candidate.manifest.id.clone(),
            });
        }
        Ok(())
    }

    fn require_newer_version(&self) -> Result<(), DecisionError> {
        if precedence(&self.candidate_version, &self.installed_version) != Ordering::Greater {
            return Err(DecisionError::NoNewerVersion);
        }
        Ok(())
    }

    fn require_compatible_host(&self) -> Result<(), DecisionError> {
        let Some(required) = self.candidate.manifest.min_host_version.as_deref() else {
            return Ok(());
        };
        if required.is_empty() {
            return Ok(());
        }

        let required_version = parse_version("required host", required)?;
        let host_version = parse_version("host", &self.host_version)?;

        if precedence(&host_version, &required_version) == Ordering::Less {
            return Err(DecisionError::IncompatibleHost {
                extension_id: self.installed.id.clone(),
                installed_version: self.installed.version.clone(),
                candidate_version: self.candidate.manifest.version.clone(),
                host_version: self.host_version.clone(),
                required_host_version: required.to_string(),
            });
        }
        Ok(())
    }
}
