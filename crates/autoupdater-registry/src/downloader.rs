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

//! Extension artifact downloader with bounded retry

use crate::client::USER_AGENT;
use crate::error::{RegistryError, Result, download_error};
use async_trait::async_trait;
use autoupdater_core::ArtifactFetcher;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const MAX_ATTEMPTS: usize = 3;
const RETRY_DELAYS: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(5)];

#[derive(Debug, Clone)]
pub struct HttpArtifactFetcher {
    client: Client,
    max_attempts: usize,
    retry_delays: Vec<Duration>,
}

impl HttpArtifactFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DOWNLOAD_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_attempts: MAX_ATTEMPTS,
            retry_delays: RETRY_DELAYS.to_vec(),
        })
    }

    /// Override the retry schedule. `delays[n]` is waited before attempt `n + 2`;
    /// the last delay repeats when there are more attempts than delays.
    #[must_use]
    pub fn with_retry_delays(mut self, max_attempts: usize, delays: Vec<Duration>) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delays = delays;
        self
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut attempt = 1;
        loop {
            match self.download_once(url).await {
                Ok(bytes) => {
                    debug!("Downloaded {} bytes from {url}", bytes.len());
                    return Ok(bytes);
                }
                Err(e) if attempt >= self.max_attempts || !e.is_retryable() => return Err(e),
                Err(e) => {
                    let delay = self
                        .retry_delays
                        .get(attempt - 1)
                        .or(self.retry_delays.last())
                        .copied()
                        .unwrap_or_default();
                    warn!(
                        "Download of {url} failed (attempt {attempt}/{}): {e}. Retrying in {delay:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn download_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(&self, url: &str) -> autoupdater_core::Result<Vec<u8>> {
        self.download(url).await.map_err(download_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoupdater_core::UpdaterError;
    use mockito::Server;

    fn fast_fetcher() -> HttpArtifactFetcher {
        HttpArtifactFetcher::new()
            .unwrap()
            .with_retry_delays(3, vec![Duration::from_millis(5)])
    }

    #[tokio::test]
    async fn test_download_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/x-1.3.0.tar.gz")
            .with_status(200)
            .with_header("content-type", "application/octet-stream")
            .with_body(b"bundle-bytes")
            .create_async()
            .await;

        let bytes = fast_fetcher()
            .download(&format!("{}/x-1.3.0.tar.gz", server.url()))
            .await
            .unwrap();

        assert_eq!(bytes, b"bundle-bytes");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/x.tar.gz")
            .with_status(502)
            .expect(3)
            .create_async()
            .await;

        let result = fast_fetcher()
            .download(&format!("{}/x.tar.gz", server.url()))
            .await;

        assert!(matches!(
            result,
            Err(RegistryError::Api { status: 502, .. })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/gone.tar.gz")
            .with_status(404)
            .with_body("no such artifact")
            .expect(1)
            .create_async()
            .await;

        let result = fast_fetcher()
            .fetch(&format!("{}/gone.tar.gz", server.url()))
            .await;

        match result {
            Err(UpdaterError::Download(message)) => assert!(message.contains("404")),
            other => panic!("expected download error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let fetcher = HttpArtifactFetcher::new()
            .unwrap()
            .with_retry_delays(1, Vec::new());

        let result = fetcher.download("http://127.0.0.1:1/x.tar.gz").await;
        assert!(matches!(result, Err(RegistryError::Http(_))));
    }
}
