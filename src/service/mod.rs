//! Pulumi Cloud API interaction module
//!
//! # Module Structure
//!
//! - [`credentials`] - Access token resolution (flag, environment, `pulumi login`)
//! - [`client`] - Main client for making API requests
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use pulumiservice::service::{client::ServiceClient, credentials};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let token = credentials::resolve_access_token(None)?;
//!     let client = ServiceClient::new("https://api.pulumi.com", token)?;
//!     let team = client.get(client.org_url("acme", &["teams", "core"])?).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod credentials;
pub mod http;

pub use client::{ServiceClient, DEFAULT_SERVICE_URL};
pub use http::{error_status, format_service_error, ApiError};
