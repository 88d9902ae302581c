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

//! Process settings loaded from a TOML file

use anyhow::{Context, Result, bail};
use autoupdater_core::{ConfigOption, DEFAULT_POLL_INTERVAL};
use autoupdater_registry::RegistryClient;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub registry: RegistrySettings,
    pub host: HostSettings,
    #[serde(default)]
    pub updater: UpdaterSettings,
    #[serde(default)]
    pub lock: LockSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrySettings {
    /// Without a URL the engine keeps polling but reports every cycle as
    /// having no registry to check against
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_registry_token_env")]
    pub token_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostSettings {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_host_token_env")]
    pub token_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdaterSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub skip_list: Vec<String>,
    /// 0 lets every install of a cycle run at once
    #[serde(default)]
    pub max_concurrent_installs: usize,
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LockSettings {
    /// Lock file on storage shared by every node. Without it the lock only
    /// covers this process.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_registry_token_env() -> String {
    "AUTOUPDATER_REGISTRY_TOKEN".to_owned()
}

fn default_host_token_env() -> String {
    "AUTOUPDATER_HOST_TOKEN".to_owned()
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_download_timeout_secs() -> u64 {
    60 * 60
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            skip_list: Vec::new(),
            max_concurrent_installs: 0,
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

/// Config value first, then the named environment variable
fn resolve_token(token: Option<&String>, env: &str) -> Option<String> {
    token
        .filter(|t| !t.is_empty())
        .cloned()
        .or_else(|| std::env::var(env).ok().filter(|t| !t.is_empty()))
}

impl RegistrySettings {
    pub fn resolved_token(&self) -> Option<String> {
        resolve_token(self.token.as_ref(), &self.token_env)
    }
}

impl HostSettings {
    pub fn resolved_token(&self) -> Option<String> {
        resolve_token(self.token.as_ref(), &self.token_env)
    }
}

impl LockSettings {
    /// Whether the lock is shared with other nodes rather than process-local
    pub fn is_cluster_wide(&self) -> bool {
        self.path.is_some()
    }
}

impl UpdaterSettings {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !is_http_url(&self.host.url) {
            bail!("host.url must be an http(s) URL");
        }
        if let Some(url) = &self.registry.url
            && !is_http_url(url)
        {
            bail!("registry.url must be an http(s) URL");
        }
        if self.updater.poll_interval_secs == 0 {
            bail!("updater.poll_interval_secs must be greater than zero");
        }
        if self.updater.download_timeout_secs == 0 {
            bail!("updater.download_timeout_secs must be greater than zero");
        }
        if self.updater.skip_list.iter().any(|id| id.trim().is_empty()) {
            bail!("updater.skip_list must not contain empty ids");
        }
        Ok(())
    }

    /// Engine options described by these settings
    pub fn to_options(&self) -> Result<Vec<ConfigOption>> {
        let mut options = vec![
            ConfigOption::PollInterval(Duration::from_secs(self.updater.poll_interval_secs)),
            ConfigOption::SkipList(self.updater.skip_list.clone()),
            ConfigOption::MaxConcurrentInstalls(NonZeroUsize::new(
                self.updater.max_concurrent_installs,
            )),
        ];

        if let Some(url) = &self.registry.url {
            let client = RegistryClient::new(url.as_str())
                .context("Failed to create registry client")?
                .with_token(self.registry.resolved_token());
            options.push(ConfigOption::Registry(Arc::new(client)));
        }
        Ok(options)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
        [registry]
        url = "https://registry.example.com"
        token = "registry-secret"

        [host]
        url = "http://localhost:8065"
        token = "host-secret"

        [updater]
        poll_interval_secs = 60
        skip_list = ["autoupdater", "legacy"]
        max_concurrent_installs = 2

        [lock]
        path = "/shared/autoupdater.lock"
    "#;

    #[test]
    fn test_full_settings() {
        let settings = Settings::from_toml(FULL).unwrap();

        assert_eq!(
            settings.registry.url.as_deref(),
            Some("https://registry.example.com")
        );
        assert_eq!(
            settings.registry.resolved_token().as_deref(),
            Some("registry-secret")
        );
        assert_eq!(settings.host.url, "http://localhost:8065");
        assert_eq!(settings.updater.poll_interval_secs, 60);
        assert_eq!(settings.updater.skip_list, ["autoupdater", "legacy"]);
        assert_eq!(
            settings.lock.path.as_deref(),
            Some(Path::new("/shared/autoupdater.lock"))
        );
        assert!(settings.lock.is_cluster_wide());
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml("[host]\nurl = \"http://localhost:8065\"\n").unwrap();

        assert!(settings.registry.url.is_none());
        assert_eq!(settings.updater.poll_interval_secs, 180);
        assert_eq!(settings.updater.download_timeout(), Duration::from_secs(3600));
        assert_eq!(settings.updater.max_concurrent_installs, 0);
        assert!(settings.updater.skip_list.is_empty());
        assert!(settings.lock.path.is_none());
        assert!(!settings.lock.is_cluster_wide());
        assert_eq!(settings.host.token_env, "AUTOUPDATER_HOST_TOKEN");
    }

    #[test]
    fn test_missing_host_section() {
        assert!(Settings::from_toml("[updater]\npoll_interval_secs = 10\n").is_err());
    }

    #[test]
    fn test_validation_errors() {
        let bad_host = "[host]\nurl = \"localhost\"\n";
        let zero_interval =
            "[host]\nurl = \"http://h\"\n[updater]\npoll_interval_secs = 0\n";
        let bad_registry = "[host]\nurl = \"http://h\"\n[registry]\nurl = \"ftp://r\"\n";
        let empty_skip = "[host]\nurl = \"http://h\"\n[updater]\nskip_list = [\" \"]\n";

        for content in [bad_host, zero_interval, bad_registry, empty_skip] {
            assert!(Settings::from_toml(content).is_err(), "accepted {content}");
        }
    }

    #[test]
    fn test_token_from_environment() {
        let settings = Settings::from_toml(
            "[host]\nurl = \"http://h\"\ntoken_env = \"AUTOUPDATER_TEST_HOST_TOKEN_7F3A\"\n",
        )
        .unwrap();

        assert_eq!(settings.host.resolved_token(), None);

        // SAFETY: the variable name is unique to this test
        unsafe { std::env::set_var("AUTOUPDATER_TEST_HOST_TOKEN_7F3A", "from-env") };
        assert_eq!(settings.host.resolved_token().as_deref(), Some("from-env"));
        unsafe { std::env::remove_var("AUTOUPDATER_TEST_HOST_TOKEN_7F3A") };
    }

    #[test]
    fn test_to_options() {
        let settings = Settings::from_toml(FULL).unwrap();
        let config = autoupdater_core::EngineConfig::default().with_options(
            settings.to_options().unwrap(),
        );

        assert!(config.registry.is_some());
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert!(config.skip_list.contains("legacy"));
        assert_eq!(config.max_concurrent_installs, NonZeroUsize::new(2));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.updater.skip_list.len(), 2);

        assert!(Settings::from_file(Path::new("/nonexistent/autoupdater.toml")).is_err());
    }
}
