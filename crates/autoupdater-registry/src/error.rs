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

//! Error types for the registry crate

use autoupdater_core::UpdaterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("config error: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry responded with {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse registry response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl RegistryError {
    /// Transport failures and server-side errors may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Config(_) | Self::Parse(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Engine-facing view of a failed listing
pub(crate) fn listing_error(err: RegistryError) -> UpdaterError {
    UpdaterError::Registry(err.to_string())
}

/// Engine-facing view of a failed artifact download
pub(crate) fn download_error(err: RegistryError) -> UpdaterError {
    UpdaterError::Download(err.to_string())
}
