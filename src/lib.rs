//! Typed SDK for Pulumi Cloud resources
//!
//! Declare teams, webhooks, OIDC issuers, access tokens, ESC environments,
//! deployments and their schedules as validated, immutable values, then
//! create, read, update or delete them through the Pulumi Cloud REST API.
//!
//! - [`kinds`] - One typed wrapper and builder per resource kind
//! - [`resource`] - Kind registry, validation, declarations and dispatch
//! - [`service`] - HTTP client and credentials
//! - [`config`] - Persistent user configuration

pub mod config;
pub mod kinds;
pub mod resource;
pub mod service;

/// Version injected at compile time via PULUMISERVICE_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("PULUMISERVICE_VERSION") {
    Some(v) => v,
    None => "dev",
};

pub use kinds::Resource;
pub use resource::{Declaration, Output, Secret, ValidationError};
pub use service::ServiceClient;
