//! Resource Dispatch
//!
//! Maps resource operations (create, read, update, delete) to Pulumi Cloud
//! REST API calls. Each kind's `service` in the registry selects the API
//! family; the kind key selects the call within it.

use super::declaration::{Declaration, Output};
use super::registry::resolve_kind;
use crate::service::client::ServiceClient;
use crate::service::http::ApiError;
use anyhow::{Context, Result};
use futures::future::join_all;
use serde_json::{Map, Value};

mod agent_pools;
mod approvals;
mod deployments;
mod environments;
mod oidc;
mod schedules;
mod stack_tags;
mod teams;
mod tokens;
mod webhooks;

/// Create the resource a declaration describes and return it materialized
pub async fn create(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    if let Output::Resolved(id) = decl.id() {
        return Err(anyhow::anyhow!("{} already exists as '{}'", decl.kind(), id));
    }

    tracing::info!("create: kind={}", decl.kind());

    let service = decl.definition().service.as_str();
    match service {
        "teams" => teams::create_in_teams(client, decl).await,
        "webhooks" => webhooks::create_webhook(client, decl).await,
        "oidc" => oidc::create_oidc_issuer(client, decl).await,
        "schedules" => schedules::create_schedule(client, decl).await,
        "stacks" => stack_tags::create_stack_tag(client, decl).await,
        "agent-pools" => agent_pools::create_agent_pool(client, decl).await,
        "tokens" => tokens::create_access_token(client, decl).await,
        "environments" => environments::create_environment(client, decl).await,
        "approvals" => approvals::create_approval_rule(client, decl).await,
        "deployments" => deployments::create_in_deployments(client, decl).await,
        _ => Err(anyhow::anyhow!("Unknown service: {}", service)),
    }
}

/// Read a resource by ID. `Ok(None)` means it no longer exists.
///
/// Pulumi Cloud never returns some inputs (webhook secrets, GitHub team
/// IDs, agent pool tokens); they are carried over from `prior` when given.
/// `prior` must be the declaration last applied to the service, never the
/// one about to be applied, or the carried values hide pending changes.
pub async fn read(
    client: &ServiceClient,
    kind: &str,
    id: &str,
    prior: Option<&Declaration>,
) -> Result<Option<Declaration>> {
    let Some((key, def)) = resolve_kind(kind) else {
        return Err(anyhow::anyhow!("Unknown resource kind: {}", kind));
    };

    tracing::debug!("read: kind={}, id={}", key, id);

    let result = match key {
        "team" => teams::read_team(client, id, prior).await,
        "team-stack-permission" => teams::read_team_stack_permission(client, id).await,
        "team-environment-permission" => teams::read_team_environment_permission(client, id, prior).await,
        "webhook" => webhooks::read_webhook(client, id, prior).await,
        "oidc-issuer" => oidc::read_oidc_issuer(client, id).await,
        "drift-schedule" | "ttl-schedule" => schedules::read_schedule(client, key, id, prior).await,
        "stack-tag" => stack_tags::read_stack_tag(client, id).await,
        "agent-pool" => agent_pools::read_agent_pool(client, id, prior).await,
        "access-token" | "org-access-token" | "team-access-token" => {
            tokens::read_access_token(client, key, id, prior).await
        }
        "environment" => environments::read_environment(client, id, prior).await,
        "approval-rule" => approvals::read_approval_rule(client, id).await,
        "deployment-settings" => deployments::read_deployment_settings(client, id, prior).await,
        "deployment" => deployments::read_deployment(client, id, prior).await,
        _ => Err(anyhow::anyhow!("Unknown service: {}", def.service)),
    };

    result.with_context(|| format!("Failed to read {} '{}'", def.display_name, id))
}

/// Update the resource `id` to match `new`, reading its current state first
pub async fn update_by_id(client: &ServiceClient, id: &str, new: Declaration) -> Result<Declaration> {
    let old = read(client, new.kind(), id, None)
        .await?
        .ok_or_else(|| anyhow::anyhow!("{} '{}' not found", new.kind(), id))?;
    update(client, &old, new).await
}

/// Read several resources concurrently, in input order
pub async fn read_many(
    client: &ServiceClient,
    targets: &[(String, String)],
) -> Vec<Result<Option<Declaration>>> {
    let reads = targets
        .iter()
        .map(|(kind, id)| read(client, kind, id, None));
    join_all(reads).await
}

/// Move a resource from `old` to `new`.
///
/// In-place changes are applied directly. A change to any field that
/// forces replacement deletes the old resource before creating the new one.
pub async fn update(client: &ServiceClient, old: &Declaration, new: Declaration) -> Result<Declaration> {
    let Output::Resolved(id) = old.id() else {
        return Err(anyhow::anyhow!("{} has not been created yet", old.kind()));
    };
    let id = id.to_string();

    let diff = old.diff(&new)?;
    if !diff.has_changes() && !old.definition().update_always {
        tracing::debug!("update: {} '{}' unchanged", old.kind(), id);
        return Ok(new.materialize(id, old.exposed_outputs()));
    }

    if diff.requires_replace() {
        tracing::info!(
            "update: replacing {} '{}' ({} changed)",
            old.kind(),
            id,
            diff.replaced_fields().join(", ")
        );
        delete(client, old).await?;
        return create(client, new).await;
    }

    tracing::info!("update: kind={}, id={}", old.kind(), id);

    match old.kind() {
        "team" => teams::update_team(client, old, new, &id).await,
        "webhook" => webhooks::update_webhook(client, old, new, &id).await,
        "oidc-issuer" => oidc::update_oidc_issuer(client, old, new, &id).await,
        "drift-schedule" | "ttl-schedule" => schedules::update_schedule(client, old, new, &id).await,
        "agent-pool" => agent_pools::update_agent_pool(client, old, new, &id).await,
        "environment" => environments::update_environment(client, old, new, &id).await,
        "approval-rule" => approvals::update_approval_rule(client, old, new, &id).await,
        "deployment-settings" => deployments::update_deployment_settings(client, new, &id).await,
        "deployment" => deployments::deploy(client, new).await,
        kind => Err(anyhow::anyhow!("{} cannot be updated in place", kind)),
    }
}

/// Delete a materialized resource
pub async fn delete(client: &ServiceClient, decl: &Declaration) -> Result<()> {
    let Output::Resolved(id) = decl.id() else {
        return Err(anyhow::anyhow!("{} has not been created yet", decl.kind()));
    };
    let force = decl.input_bool("forceDestroy").unwrap_or(false);
    delete_resource(client, decl.kind(), id, force).await
}

/// Delete a resource by kind and ID
pub async fn delete_by_id(client: &ServiceClient, kind: &str, id: &str) -> Result<()> {
    let Some((key, _)) = resolve_kind(kind) else {
        return Err(anyhow::anyhow!("Unknown resource kind: {}", kind));
    };
    delete_resource(client, key, id, false).await
}

async fn delete_resource(client: &ServiceClient, key: &str, id: &str, force: bool) -> Result<()> {
    tracing::info!("delete: kind={}, id={}", key, id);

    let result = match key {
        "team" => teams::delete_team(client, id).await,
        "team-stack-permission" => teams::delete_team_stack_permission(client, id).await,
        "team-environment-permission" => teams::delete_team_environment_permission(client, id).await,
        "webhook" => webhooks::delete_webhook(client, id).await,
        "oidc-issuer" => oidc::delete_oidc_issuer(client, id).await,
        "drift-schedule" | "ttl-schedule" => schedules::delete_schedule(client, key, id).await,
        "stack-tag" => stack_tags::delete_stack_tag(client, id).await,
        "agent-pool" => agent_pools::delete_agent_pool(client, id, force).await,
        "access-token" | "org-access-token" | "team-access-token" => {
            tokens::delete_access_token(client, key, id).await
        }
        "environment" => environments::delete_environment(client, id).await,
        "approval-rule" => approvals::delete_approval_rule(client, id).await,
        "deployment-settings" => deployments::delete_deployment_settings(client, id).await,
        "deployment" => deployments::destroy_deployment(client, id).await,
        _ => Err(anyhow::anyhow!("Unknown resource kind: {}", key)),
    };

    result.with_context(|| format!("Failed to delete {} '{}'", key, id))
}

// =============================================================================
// Helpers
// =============================================================================

fn required_str(decl: &Declaration, field: &str) -> Result<String> {
    decl.input_str(field)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("{} has no {}", decl.kind(), field))
}

/// Split a composite ID into exactly `parts` non-empty segments
fn split_id<'a>(id: &'a str, parts: usize, format: &str) -> Result<Vec<&'a str>> {
    let split: Vec<&str> = id.split('/').collect();
    if split.len() != parts || split.iter().any(|s| s.is_empty()) {
        return Err(anyhow::anyhow!(
            "'{}' is invalid, must be in the format {}",
            id,
            format
        ));
    }
    Ok(split)
}

fn is_conflict(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_conflict)
}

fn parse_response<T: serde::de::DeserializeOwned>(response: Value, what: &str) -> Result<T> {
    serde_json::from_value(response).with_context(|| format!("Failed to parse {} response", what))
}

fn insert_str(map: &mut Map<String, Value>, field: &str, value: &str) {
    if !value.is_empty() {
        map.insert(field.to_string(), Value::String(value.to_string()));
    }
}

fn copy_input(map: &mut Map<String, Value>, decl: &Declaration, field: &str) {
    let value = decl
        .input(field)
        .or_else(|| decl.secret_input(field).map(|secret| secret.expose()));
    if let Some(value) = value {
        map.insert(field.to_string(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_id_requires_exact_parts() {
        assert_eq!(split_id("acme/core", 2, "org/team").unwrap(), vec!["acme", "core"]);
        assert!(split_id("acme", 2, "org/team").is_err());
        assert!(split_id("acme//core", 3, "org/x/team").is_err());
    }
}
