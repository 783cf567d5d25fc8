//! Configuration Management
//!
//! Handles persistent configuration storage for pulumiservice.

use crate::resource::Secret;
use crate::service::credentials::{self, ENV_BACKEND_URL};
use crate::service::DEFAULT_SERVICE_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User configuration. Never holds an access token.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Pulumi Cloud API URL
    #[serde(default)]
    pub service_url: Option<String>,
    /// Organization used when a declaration file leaves it out
    #[serde(default)]
    pub organization: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pulumiservice").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from a specific file; a missing or unreadable file yields defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective service URL (CLI > environment > config > default)
    pub fn effective_service_url(&self, flag: Option<&str>) -> String {
        flag.filter(|u| !u.is_empty())
            .map(str::to_string)
            .or_else(|| std::env::var(ENV_BACKEND_URL).ok().filter(|u| !u.is_empty()))
            .or_else(|| self.service_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string())
    }

    /// Get effective access token (CLI > environment > `pulumi login`)
    pub fn effective_token(&self, flag: Option<&str>) -> Result<Secret<String>> {
        credentials::resolve_access_token(flag)
    }

    /// Set the service URL; an empty value clears it
    pub fn set_service_url(&mut self, url: &str) -> Result<()> {
        if url.is_empty() {
            self.service_url = None;
            return Ok(());
        }
        url::Url::parse(url).with_context(|| format!("Invalid service URL: {}", url))?;
        self.service_url = Some(url.trim_end_matches('/').to_string());
        Ok(())
    }

    /// Set the default organization; an empty value clears it
    pub fn set_organization(&mut self, organization: &str) -> Result<()> {
        if organization.contains('/') {
            anyhow::bail!("Invalid organization name: {}", organization);
        }
        self.organization = Some(organization.to_string()).filter(|o| !o.is_empty());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            service_url: Some("https://pulumi.example.com".to_string()),
            organization: Some("acme".to_string()),
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_missing_or_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert_eq!(Config::load_from(&path), Config::default());
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_setters_persist_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.set_service_url("https://pulumi.example.com/").unwrap();
        config.set_organization("acme").unwrap();
        config.save_to(&path).unwrap();

        let mut loaded = Config::load_from(&path);
        assert_eq!(loaded.service_url.as_deref(), Some("https://pulumi.example.com"));
        assert_eq!(loaded.organization.as_deref(), Some("acme"));

        loaded.set_organization("").unwrap();
        loaded.set_service_url("").unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_setters_reject_bad_values() {
        let mut config = Config::default();
        assert!(config.set_service_url("not a url").is_err());
        assert!(config.set_organization("acme/web").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_flag_wins_service_url() {
        let config = Config {
            service_url: Some("https://from-config".to_string()),
            organization: None,
        };
        assert_eq!(
            config.effective_service_url(Some("https://from-flag")),
            "https://from-flag"
        );
    }
}
