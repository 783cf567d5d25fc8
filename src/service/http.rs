//! HTTP utilities for Pulumi Cloud REST API calls

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Media type pinning the Pulumi Cloud API version
const PULUMI_ACCEPT: &str = "application/vnd.pulumi+8";

/// Identifies this client to Pulumi Cloud
const PULUMI_SOURCE: &str = "provider";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const YAML_MEDIA_TYPE: &str = "application/x-yaml";

/// Non-success response from Pulumi Cloud
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Pulumi Cloud request failed with status {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16()
    }

    pub fn is_conflict(&self) -> bool {
        self.status == StatusCode::CONFLICT.as_u16()
    }
}

/// Error body returned by Pulumi Cloud
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// HTTP status of a failed request, if the error came from Pulumi Cloud
pub fn error_status(error: &anyhow::Error) -> Option<u16> {
    error.downcast_ref::<ApiError>().map(|e| e.status)
}

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub(crate) fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for Pulumi Cloud API calls
#[derive(Clone)]
pub struct ServiceHttpClient {
    client: Client,
}

impl ServiceHttpClient {
    /// Create a new HTTP client with the Pulumi Cloud headers preset
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(PULUMI_ACCEPT));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("X-Pulumi-Source", HeaderValue::from_static(PULUMI_SOURCE));

        let client = Client::builder()
            .user_agent(format!("pulumiservice/{}", crate::VERSION))
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request
    pub async fn get(&self, url: Url, token: &str) -> Result<Value> {
        self.send(Method::GET, url, token, None).await
    }

    /// Make a POST request
    pub async fn post(&self, url: Url, token: &str, body: Option<&Value>) -> Result<Value> {
        self.send(Method::POST, url, token, body).await
    }

    /// Make a PUT request
    pub async fn put(&self, url: Url, token: &str, body: &Value) -> Result<Value> {
        self.send(Method::PUT, url, token, Some(body)).await
    }

    /// Make a PATCH request
    pub async fn patch(&self, url: Url, token: &str, body: &Value) -> Result<Value> {
        self.send(Method::PATCH, url, token, Some(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: Url, token: &str) -> Result<Value> {
        self.send(Method::DELETE, url, token, None).await
    }

    /// GET a YAML document, such as an ESC environment definition
    pub async fn get_yaml(&self, url: Url, token: &str) -> Result<String> {
        self.send_raw(Method::GET, url, token, None, Some(YAML_MEDIA_TYPE))
            .await
    }

    /// PATCH with a YAML body; the response is JSON
    pub async fn patch_yaml(&self, url: Url, token: &str, yaml: &str) -> Result<Value> {
        let body = RequestBody::Yaml(yaml);
        let response = self
            .send_raw(Method::PATCH, url, token, Some(body), None)
            .await?;
        parse_json(&response)
    }

    async fn send(&self, method: Method, url: Url, token: &str, body: Option<&Value>) -> Result<Value> {
        let response = self
            .send_raw(method, url, token, body.map(RequestBody::Json), None)
            .await?;
        parse_json(&response)
    }

    async fn send_raw(
        &self,
        method: Method,
        url: Url,
        token: &str,
        body: Option<RequestBody<'_>>,
        accept: Option<&'static str>,
    ) -> Result<String> {
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", token));

        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        request = match body {
            Some(RequestBody::Json(body)) => request.json(body),
            Some(RequestBody::Yaml(body)) => request
                .header(CONTENT_TYPE, YAML_MEDIA_TYPE)
                .body(body.to_string()),
            None => request,
        };

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only the sanitized body is logged; request bodies may carry secrets
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            let message = serde_json::from_str::<ErrorBody>(&response_body)
                .ok()
                .map(|b| b.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
            return Err(ApiError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        Ok(response_body)
    }
}

/// Outgoing request payload
enum RequestBody<'a> {
    Json(&'a Value),
    Yaml(&'a str),
}

fn parse_json(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).context("Failed to parse response JSON")
}

/// Format a Pulumi Cloud error for display
/// Maps well-known statuses to short hints and truncates everything else
pub fn format_service_error(error: &anyhow::Error) -> String {
    match error_status(error) {
        Some(401) => {
            return "Authentication failed. Run 'pulumi login' or set PULUMI_ACCESS_TOKEN.".to_string()
        }
        Some(403) => return "Permission denied. Check your Pulumi Cloud organization role.".to_string(),
        Some(404) => return "Resource not found.".to_string(),
        Some(409) => {
            return "Resource conflict. The resource may already exist or be in use.".to_string()
        }
        Some(429) => return "Rate limit exceeded. Please try again later.".to_string(),
        Some(status) if status >= 500 => {
            return "Pulumi Cloud is temporarily unavailable. Please try again.".to_string()
        }
        _ => {}
    }

    let error_str = format!("{:#}", error);
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(160)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.contains("500 bytes total"));
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("bad\nline\tend"), "badlineend");
    }

    #[test]
    fn test_sanitize_respects_char_boundaries() {
        let body = format!("{}é{}", "a".repeat(MAX_LOG_BODY_LENGTH - 1), "b".repeat(10));
        assert!(sanitize_for_log(&body).contains("bytes total"));
    }

    #[test]
    fn test_error_status_roundtrips_through_anyhow() {
        let err: anyhow::Error = ApiError {
            status: 404,
            message: "Not Found".into(),
        }
        .into();
        let err = err.context("reading webhook");
        assert_eq!(error_status(&err), Some(404));
        assert_eq!(format_service_error(&err), "Resource not found.");
    }

    #[test]
    fn test_format_unrelated_error() {
        let err = anyhow::anyhow!("connection refused");
        assert_eq!(error_status(&err), None);
        assert_eq!(format_service_error(&err), "connection refused");
    }
}
