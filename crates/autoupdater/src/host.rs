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

//! Host application REST API adapter

use async_trait::async_trait;
use autoupdater_core::{ExtensionManifest, HostApi, UpdaterError};
use reqwest::{Client, Response, StatusCode, header};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum HostError {
    #[error("config error: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication with the host failed")]
    AuthenticationFailed,

    #[error("host responded with {status}: {message}")]
    Api { status: u16, message: String },
}

impl From<HostError> for UpdaterError {
    fn from(err: HostError) -> Self {
        UpdaterError::Host(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    version: String,
}

/// Talks to the host's extension management endpoints
#[derive(Clone)]
pub struct HttpHost {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl HttpHost {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, HostError> {
        let client = Client::builder()
            .user_agent(concat!("autoupdater/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HostError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        debug!("Host request {method} {url}");

        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn list_extensions(&self) -> Result<Vec<ExtensionManifest>, HostError> {
        let response = self
            .request(reqwest::Method::GET, "/api/extensions")
            .timeout(QUERY_TIMEOUT)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn install(
        &self,
        artifact: Vec<u8>,
        replace: bool,
    ) -> Result<ExtensionManifest, HostError> {
        let response = self
            .request(reqwest::Method::PUT, "/api/extensions")
            .query(&[("replace", replace)])
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .timeout(INSTALL_TIMEOUT)
            .body(artifact)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn version(&self) -> Result<String, HostError> {
        let response = self
            .request(reqwest::Method::GET, "/api/version")
            .timeout(QUERY_TIMEOUT)
            .send()
            .await?;
        let body: VersionResponse = check(response).await?.json().await?;
        Ok(body.version)
    }
}

async fn check(response: Response) -> Result<Response, HostError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!("Host rejected the configured token");
            Err(HostError::AuthenticationFailed)
        }
        status => {
            let message = response.text().await.unwrap_or_default();
            Err(HostError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

impl std::fmt::Debug for HttpHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHost")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HostApi for HttpHost {
    async fn installed_extensions(&self) -> autoupdater_core::Result<Vec<ExtensionManifest>> {
        Ok(self.list_extensions().await?)
    }

    async fn install_extension(
        &self,
        artifact: Vec<u8>,
        replace: bool,
    ) -> autoupdater_core::Result<ExtensionManifest> {
        self.install(artifact, replace)
            .await
            .map_err(|e| UpdaterError::Install(e.to_string()))
    }

    async fn host_version(&self) -> autoupdater_core::Result<String> {
        Ok(self.version().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_installed_extensions() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/extensions")
            .match_header("authorization", "Bearer host-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {"id": "x", "name": "X", "version": "1.2.1"},
                    {"id": "y", "version": "2.3.0", "min_server_version": "5.0.0"}
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let host = HttpHost::new(server.url(), Some("host-token".to_string())).unwrap();
        let installed = host.installed_extensions().await.unwrap();

        assert_eq!(installed.len(), 2);
        assert_eq!(installed[0].id, "x");
        assert_eq!(installed[0].version, "1.2.1");
        assert_eq!(installed[1].min_host_version.as_deref(), Some("5.0.0"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_install_uploads_artifact() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/extensions")
            .match_query(Matcher::UrlEncoded("replace".into(), "true".into()))
            .match_header("content-type", "application/octet-stream")
            .match_body(Matcher::Exact("bundle".to_string()))
            .with_status(201)
            .with_body(json!({"id": "x", "version": "1.3.0"}).to_string())
            .create_async()
            .await;

        let host = HttpHost::new(server.url(), None).unwrap();
        let manifest = host
            .install_extension(b"bundle".to_vec(), true)
            .await
            .unwrap();

        assert_eq!(manifest.id, "x");
        assert_eq!(manifest.version, "1.3.0");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_install_failure_is_install_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/extensions")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("bundle is not a valid extension")
            .create_async()
            .await;

        let host = HttpHost::new(server.url(), None).unwrap();
        let result = host.install_extension(b"junk".to_vec(), true).await;

        match result {
            Err(UpdaterError::Install(message)) => {
                assert!(message.contains("bundle is not a valid extension"));
            }
            other => panic!("expected install error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_host_version() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/version")
            .with_status(200)
            .with_body(json!({"version": "5.4.0"}).to_string())
            .create_async()
            .await;

        let host = HttpHost::new(format!("{}/", server.url()), None).unwrap();
        assert_eq!(host.host_version().await.unwrap(), "5.4.0");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/extensions")
            .with_status(401)
            .create_async()
            .await;

        let host = HttpHost::new(server.url(), Some("stale".to_string())).unwrap();

        assert!(matches!(
            host.list_extensions().await,
            Err(HostError::AuthenticationFailed)
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_maps_to_host_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/version")
            .with_status(500)
            .with_body("database unavailable")
            .create_async()
            .await;

        let host = HttpHost::new(server.url(), None).unwrap();

        match host.host_version().await {
            Err(UpdaterError::Host(message)) => assert!(message.contains("500")),
            other => panic!("expected host error, got {other:?}"),
        }
        mock.assert_async().await;
    }
}
