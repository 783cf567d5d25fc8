//! Pulumi Cloud credentials
//!
//! Resolves the access token from, in order: an explicit value (CLI flag),
//! the `PULUMI_ACCESS_TOKEN` environment variable, and the credentials the
//! Pulumi CLI stores after `pulumi login`.

use crate::resource::Secret;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const ENV_ACCESS_TOKEN: &str = "PULUMI_ACCESS_TOKEN";
pub const ENV_BACKEND_URL: &str = "PULUMI_BACKEND_URL";
pub const ENV_PULUMI_HOME: &str = "PULUMI_HOME";

/// Credentials file written by `pulumi login`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    /// Backend URL of the current login
    #[serde(default)]
    pub current: String,
    #[serde(default)]
    access_tokens: HashMap<String, String>,
}

impl StoredCredentials {
    /// Token stored for the current login
    pub fn current_token(&self) -> Option<Secret<String>> {
        self.access_tokens
            .get(&self.current)
            .filter(|t| !t.is_empty())
            .map(|t| Secret::new(t.clone()))
    }

    /// Parse a credentials file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Get the Pulumi home directory
pub fn get_pulumi_home() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_PULUMI_HOME) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::home_dir().map(|p| p.join(".pulumi"))
}

/// Read the token of the current `pulumi login`, if any
pub fn get_stored_token() -> Option<Secret<String>> {
    let path = get_pulumi_home()?.join("credentials.json");
    if !path.exists() {
        return None;
    }
    match StoredCredentials::load(&path) {
        Ok(creds) => creds.current_token(),
        Err(e) => {
            tracing::warn!("Ignoring stored credentials: {:#}", e);
            None
        }
    }
}

/// Resolve the access token (explicit > environment > stored credentials)
pub fn resolve_access_token(explicit: Option<&str>) -> Result<Secret<String>> {
    if let Some(token) = explicit.filter(|t| !t.is_empty()) {
        tracing::debug!("Using access token from command line");
        return Ok(Secret::from(token));
    }

    if let Ok(token) = std::env::var(ENV_ACCESS_TOKEN) {
        if !token.is_empty() {
            tracing::debug!("Using access token from {}", ENV_ACCESS_TOKEN);
            return Ok(Secret::new(token));
        }
    }

    if let Some(token) = get_stored_token() {
        tracing::debug!("Using access token from stored credentials");
        return Ok(token);
    }

    Err(anyhow::anyhow!(
        "Pulumi access token not found. Set {} or run 'pulumi login'",
        ENV_ACCESS_TOKEN
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_stored_credentials_current_token() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "current": "https://api.pulumi.com",
                "accessTokens": {{
                    "https://api.pulumi.com": "pul-abc",
                    "https://api.example.com": "pul-other"
                }}
            }}"#
        )
        .unwrap();

        let creds = StoredCredentials::load(file.path()).unwrap();
        assert_eq!(creds.current, "https://api.pulumi.com");
        assert_eq!(creds.current_token().unwrap().expose(), "pul-abc");
    }

    #[test]
    fn test_stored_credentials_without_current_login() {
        let creds: StoredCredentials =
            serde_json::from_str(r#"{"accessTokens": {"https://api.pulumi.com": "pul-abc"}}"#)
                .unwrap();
        assert!(creds.current_token().is_none());
    }

    #[test]
    fn test_explicit_token_wins() {
        let token = resolve_access_token(Some("pul-flag")).unwrap();
        assert_eq!(token.expose(), "pul-flag");
        assert!(!format!("{:?}", token).contains("pul-flag"));
    }
}
