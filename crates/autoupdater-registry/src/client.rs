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

//! HTTP client for the extension registry

use crate::error::{RegistryError, Result, listing_error};
use crate::types::RegistryEntry;
use async_trait::async_trait;
use autoupdater_core::{CandidateExtension, Registry};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) const USER_AGENT: &str = concat!("autoupdater/", env!("CARGO_PKG_VERSION"));

const LISTING_PATH: &str = "/api/v1/plugins";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Registry REST API client
#[derive(Clone)]
pub struct RegistryClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RegistryError::Config(
                "registry URL must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            token: None,
            client,
        })
    }

    /// Authenticate listing requests with a bearer token
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch every extension the registry offers
    pub async fn list(&self) -> Result<Vec<CandidateExtension>> {
        let url = format!("{}{LISTING_PATH}", self.base_url);
        debug!("Listing extensions from {url}");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(RegistryError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let entries: Vec<RegistryEntry> = serde_json::from_str(&body)?;
        let total = entries.len();
        let candidates: Vec<CandidateExtension> = entries
            .into_iter()
            .filter_map(RegistryEntry::into_candidate)
            .collect();

        if candidates.len() < total {
            warn!(
                "Ignoring {} registry entries without a manifest",
                total - candidates.len()
            );
        }
        Ok(candidates)
    }
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn list_extensions(&self) -> autoupdater_core::Result<Vec<CandidateExtension>> {
        self.list().await.map_err(listing_error)
    }
}
