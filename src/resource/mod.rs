//! Resource contract layer
//!
//! Pulumi Cloud resource kinds are described as data: each kind's fields,
//! their types and which changes force a replacement are loaded from JSON
//! files at compile time. Everything else in this module works from those
//! definitions rather than from per-kind code.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`check`] - Validates an input bag against a kind, reporting every failure
//! - [`declaration`] - Validated, immutable resource declarations and diffs
//! - [`dispatch`] - Maps create/read/update/delete onto Pulumi Cloud REST calls
//! - [`secret`] - Wrapper that keeps sensitive values out of logs and output
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `common.json` - Closed value sets shared by several kinds
//! - `teams.json` - Teams and their stack and environment permissions
//! - `webhooks.json` - Organization, stack and environment webhooks
//! - `orgs.json` - OIDC issuers and agent pools
//! - `stacks.json` - Drift and TTL schedules, stack tags
//! - `tokens.json` - Personal, organization and team access tokens
//! - `environments.json` - ESC environments and their approval rules
//! - `deployments.json` - Deployment settings and deployment runs
//!
//! # Example
//!
//! ```ignore
//! use pulumiservice::resource::{dispatch, Declaration};
//! use serde_json::json;
//!
//! async fn tag(client: &ServiceClient) -> anyhow::Result<()> {
//!     let decl = Declaration::from_value(
//!         "stack-tag",
//!         json!({"organization": "acme", "project": "web", "stack": "prod",
//!                "name": "owner", "value": "ops"}),
//!     )?;
//!     let created = dispatch::create(client, decl).await?;
//!     println!("{}", created);
//!     Ok(())
//! }
//! ```

mod check;
mod declaration;
pub mod dispatch;
mod error;
mod registry;
mod secret;

pub use check::check;
pub use declaration::{Declaration, Diff, DiffKind, FieldValue, Output, PropertyDiff};
pub use error::ValidationError;
pub use registry::*;
pub use secret::{Secret, MASK};
