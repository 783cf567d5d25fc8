//! Typed resource kinds
//!
//! One wrapper per registry kind around a [`Declaration`], with a builder
//! for inputs and typed accessors. The wrappers add no rules of their own:
//! building runs the same checks as [`Declaration::new`], and the generic
//! [`create`], [`read`], [`update`] and [`delete`] go through
//! [`crate::resource::dispatch`].
//!
//! # Example
//!
//! ```ignore
//! use pulumiservice::kinds::{self, Webhook, WebhookFormat};
//!
//! async fn example(client: &ServiceClient) -> anyhow::Result<()> {
//!     let hook = Webhook::builder("acme", "deploys", "https://example.com/hook", true)
//!         .format(WebhookFormat::Slack)
//!         .build()?;
//!     let hook = kinds::create(client, hook).await?;
//!     println!("created {}", hook);
//!     Ok(())
//! }
//! ```

use crate::resource::{dispatch, Declaration, Diff, Output, ValidationError};
use crate::service::ServiceClient;
use anyhow::Result;

/// Define a newtype kind around [`Declaration`] and its input builder
macro_rules! resource_kind {
    ($(#[$meta:meta])* $name:ident, $builder:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(crate::resource::Declaration);

        impl crate::kinds::Resource for $name {
            const KIND: &'static str = $kind;

            fn declaration(&self) -> &crate::resource::Declaration {
                &self.0
            }

            fn into_declaration(self) -> crate::resource::Declaration {
                self.0
            }

            fn from_declaration(
                decl: crate::resource::Declaration,
            ) -> Result<Self, crate::resource::ValidationError> {
                crate::kinds::ensure_kind(&decl, $kind)?;
                Ok(Self(decl))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl $name {
            /// Start a builder from the inputs this resource was declared with
            pub fn to_builder(&self) -> $builder {
                $builder {
                    inputs: self.0.declared_inputs(),
                }
            }
        }

        /// Input builder; `build` validates
        #[derive(Clone)]
        #[must_use]
        pub struct $builder {
            inputs: serde_json::Map<String, serde_json::Value>,
        }

        impl $builder {
            pub fn build(self) -> Result<$name, crate::resource::ValidationError> {
                crate::resource::Declaration::new($kind, self.inputs).map($name)
            }

            #[allow(dead_code)]
            fn set(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
                self.inputs.insert(field.to_string(), value.into());
                self
            }

            #[allow(dead_code)]
            fn push(mut self, field: &str, value: impl Into<serde_json::Value>) -> Self {
                let entry = self
                    .inputs
                    .entry(field.to_string())
                    .or_insert_with(|| serde_json::Value::Array(Vec::new()));
                if let serde_json::Value::Array(items) = entry {
                    items.push(value.into());
                }
                self
            }
        }
    };
}

mod access_token;
mod agent_pool;
mod approval_rule;
mod deployment;
mod enums;
mod environment;
mod oidc_issuer;
mod schedule;
mod stack_tag;
mod team;
mod webhook;

pub use access_token::{
    AccessToken, AccessTokenBuilder, OrgAccessToken, OrgAccessTokenBuilder, TeamAccessToken,
    TeamAccessTokenBuilder,
};
pub use agent_pool::{AgentPool, AgentPoolBuilder};
pub use approval_rule::{ApprovalRule, ApprovalRuleBuilder, ApprovalRuleConfig};
pub use deployment::{Deployment, DeploymentBuilder, DeploymentSettings, DeploymentSettingsBuilder};
pub use enums::*;
pub use environment::{Environment, EnvironmentBuilder};
pub use oidc_issuer::{OidcIssuer, OidcIssuerBuilder};
pub use schedule::{DriftSchedule, DriftScheduleBuilder, TtlSchedule, TtlScheduleBuilder};
pub use stack_tag::{StackTag, StackTagBuilder};
pub use team::{
    Team, TeamBuilder, TeamEnvironmentPermission, TeamEnvironmentPermissionBuilder,
    TeamStackPermission, TeamStackPermissionBuilder,
};
pub use webhook::{Webhook, WebhookBuilder};

/// A typed resource kind
pub trait Resource: Sized {
    /// Registry key of the kind
    const KIND: &'static str;

    fn declaration(&self) -> &Declaration;

    fn into_declaration(self) -> Declaration;

    /// Wrap a declaration, which must be of this kind
    fn from_declaration(decl: Declaration) -> Result<Self, ValidationError>;

    fn id(&self) -> Output<&str> {
        self.declaration().id()
    }

    fn diff(&self, new: &Self) -> Result<Diff, ValidationError> {
        self.declaration().diff(new.declaration())
    }
}

pub(crate) fn ensure_kind(decl: &Declaration, kind: &str) -> Result<(), ValidationError> {
    if decl.kind() == kind {
        Ok(())
    } else {
        Err(ValidationError::invalid(
            "kind",
            format!("expected a {} declaration, got a {}", kind, decl.kind()),
        ))
    }
}

/// Create a resource and return it with its ID and outputs
pub async fn create<R: Resource>(client: &ServiceClient, resource: R) -> Result<R> {
    let decl = dispatch::create(client, resource.into_declaration()).await?;
    Ok(R::from_declaration(decl)?)
}

/// Read a resource by ID; `prior` supplies inputs the service never returns
pub async fn read<R: Resource>(client: &ServiceClient, id: &str, prior: Option<&R>) -> Result<Option<R>> {
    let decl = dispatch::read(client, R::KIND, id, prior.map(R::declaration)).await?;
    match decl {
        Some(decl) => Ok(Some(R::from_declaration(decl)?)),
        None => Ok(None),
    }
}

/// Apply `new` over the existing `old`, replacing when required
pub async fn update<R: Resource>(client: &ServiceClient, old: &R, new: R) -> Result<R> {
    let decl = dispatch::update(client, old.declaration(), new.into_declaration()).await?;
    Ok(R::from_declaration(decl)?)
}

pub async fn delete<R: Resource>(client: &ServiceClient, resource: &R) -> Result<()> {
    dispatch::delete(client, resource.declaration()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::get_all_resource_keys;

    #[test]
    fn test_every_registry_kind_has_a_type() {
        let typed = [
            Team::KIND,
            TeamStackPermission::KIND,
            TeamEnvironmentPermission::KIND,
            Webhook::KIND,
            OidcIssuer::KIND,
            DriftSchedule::KIND,
            TtlSchedule::KIND,
            StackTag::KIND,
            AgentPool::KIND,
            AccessToken::KIND,
            OrgAccessToken::KIND,
            TeamAccessToken::KIND,
            Environment::KIND,
            ApprovalRule::KIND,
            DeploymentSettings::KIND,
            Deployment::KIND,
        ];
        let mut typed: Vec<&str> = typed.to_vec();
        typed.sort();
        assert_eq!(typed, get_all_resource_keys());
    }

    #[test]
    fn test_from_declaration_checks_kind() {
        let tag = StackTag::builder("acme", "web", "prod", "owner", "ops")
            .build()
            .unwrap();
        let err = Webhook::from_declaration(tag.into_declaration()).unwrap_err();
        assert_eq!(err.field(), Some("kind"));
    }
}
