//! Pulumi Cloud Client
//!
//! Main client for the Pulumi Cloud REST API, combining the access token,
//! the service URL and the HTTP wrapper.

use super::http::{ApiError, ServiceHttpClient};
use crate::resource::Secret;
use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

/// Public Pulumi Cloud endpoint
pub const DEFAULT_SERVICE_URL: &str = "https://api.pulumi.com";

/// Main Pulumi Cloud client
#[derive(Clone)]
pub struct ServiceClient {
    pub http: ServiceHttpClient,
    token: Secret<String>,
    base_url: Url,
}

impl ServiceClient {
    /// Create a client for `service_url`. Every call is made under its `/api/` path.
    pub fn new(service_url: &str, token: Secret<String>) -> Result<Self> {
        let mut base_url = Url::parse(service_url)
            .with_context(|| format!("Invalid service URL '{}'", service_url))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow::anyhow!("Invalid service URL '{}'", service_url));
        }
        base_url.set_path("/api/");
        base_url.set_query(None);

        tracing::debug!("Pulumi Cloud API at {}", base_url);

        Ok(Self {
            http: ServiceHttpClient::new()?,
            token,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get(&self, url: Url) -> Result<Value> {
        self.http.get(url, self.token.expose()).await
    }

    /// Make a GET request, treating 404 as absent
    pub async fn get_optional(&self, url: Url) -> Result<Option<Value>> {
        match self.get(url).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_not_found) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Make a POST request
    pub async fn post(&self, url: Url, body: Option<&Value>) -> Result<Value> {
        self.http.post(url, self.token.expose(), body).await
    }

    /// Make a PUT request
    pub async fn put(&self, url: Url, body: &Value) -> Result<Value> {
        self.http.put(url, self.token.expose(), body).await
    }

    /// Make a PATCH request
    pub async fn patch(&self, url: Url, body: &Value) -> Result<Value> {
        self.http.patch(url, self.token.expose(), body).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: Url) -> Result<Value> {
        self.http.delete(url, self.token.expose()).await
    }

    /// GET a YAML document, treating 404 as absent
    pub async fn get_yaml_optional(&self, url: Url) -> Result<Option<String>> {
        match self.http.get_yaml(url, self.token.expose()).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_not_found) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// PATCH a YAML document
    pub async fn patch_yaml(&self, url: Url, yaml: &str) -> Result<Value> {
        self.http.patch_yaml(url, self.token.expose(), yaml).await
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Build an API URL from path segments. Segments are percent-encoded.
    pub fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Service URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `orgs/{org}/...`
    pub fn org_url(&self, org: &str, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["orgs", org];
        segments.extend_from_slice(rest);
        self.api_url(&segments)
    }

    /// `stacks/{org}/{project}/{stack}/...`
    pub fn stack_url(&self, org: &str, project: &str, stack: &str, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["stacks", org, project, stack];
        segments.extend_from_slice(rest);
        self.api_url(&segments)
    }

    /// `esc/environments/{org}/{project}/{environment}/...`
    pub fn environment_url(
        &self,
        org: &str,
        project: &str,
        environment: &str,
        rest: &[&str],
    ) -> Result<Url> {
        let mut segments = vec!["esc", "environments", org, project, environment];
        segments.extend_from_slice(rest);
        self.api_url(&segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> ServiceClient {
        ServiceClient::new(url, Secret::from("pul-test")).unwrap()
    }

    #[test]
    fn test_base_url_forced_to_api_path() {
        assert_eq!(client("https://api.pulumi.com").base_url().as_str(), "https://api.pulumi.com/api/");
        assert_eq!(
            client("http://localhost:8080/somewhere?x=1").base_url().as_str(),
            "http://localhost:8080/api/"
        );
    }

    #[test]
    fn test_org_url() {
        let url = client(DEFAULT_SERVICE_URL).org_url("acme", &["teams", "core"]).unwrap();
        assert_eq!(url.as_str(), "https://api.pulumi.com/api/orgs/acme/teams/core");
    }

    #[test]
    fn test_segments_are_encoded() {
        let url = client(DEFAULT_SERVICE_URL).org_url("acme", &["hooks", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "https://api.pulumi.com/api/orgs/acme/hooks/a%20b%2Fc");
    }

    #[test]
    fn test_stack_and_environment_urls() {
        let c = client(DEFAULT_SERVICE_URL);
        assert_eq!(
            c.stack_url("acme", "web", "prod", &["tags"]).unwrap().path(),
            "/api/stacks/acme/web/prod/tags"
        );
        assert_eq!(
            c.environment_url("acme", "default", "dev", &["hooks"]).unwrap().path(),
            "/api/esc/environments/acme/default/dev/hooks"
        );
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(ServiceClient::new("not a url", Secret::from("t")).is_err());
        assert!(ServiceClient::new("mailto:ops@example.com", Secret::from("t")).is_err());
    }
}
