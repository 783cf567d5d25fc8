//! ESC environments

use super::{insert_str, parse_response, required_str};
use crate::resource::Declaration;
use crate::service::client::ServiceClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvironmentUpdateResponse {
    #[serde(default)]
    diagnostics: Vec<EnvironmentDiagnostic>,
    #[serde(default)]
    revision_number: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentDiagnostic {
    #[serde(default)]
    summary: String,
}

/// Parse `org/project/name`; the older `org/name` form means project `default`
fn split_environment_id(id: &str) -> Result<(&str, &str, &str)> {
    let parts: Vec<&str> = id.split('/').collect();
    match parts.as_slice() {
        [org, project, name] if !org.is_empty() && !project.is_empty() && !name.is_empty() => {
            Ok((*org, *project, *name))
        }
        [org, name] if !org.is_empty() && !name.is_empty() => Ok((*org, "default", *name)),
        _ => Err(anyhow::anyhow!(
            "'{}' is invalid, must be in the format organization/project/environment",
            id
        )),
    }
}

/// Replace the environment definition and return the new revision, if reported
async fn put_environment_yaml(
    client: &ServiceClient,
    org: &str,
    project: &str,
    name: &str,
    yaml: &str,
) -> Result<Option<i64>> {
    let url = client.environment_url(org, project, name, &[])?;
    let response = client.patch_yaml(url, yaml).await?;
    let update: EnvironmentUpdateResponse = if response.is_null() {
        EnvironmentUpdateResponse::default()
    } else {
        parse_response(response, "environment update")?
    };

    if !update.diagnostics.is_empty() {
        let summaries: Vec<&str> = update.diagnostics.iter().map(|d| d.summary.as_str()).collect();
        return Err(anyhow::anyhow!(
            "environment {}/{}/{} has errors: {}",
            org,
            project,
            name,
            summaries.join("; ")
        ));
    }
    Ok(update.revision_number)
}

fn environment_yaml(decl: &Declaration) -> Result<String> {
    decl.secret_input("yaml")
        .and_then(|yaml| yaml.expose().as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("environment has no yaml"))
}

fn revision_outputs(revision: Option<i64>, fallback: Map<String, Value>) -> Map<String, Value> {
    match revision {
        Some(revision) => {
            let mut outputs = Map::new();
            outputs.insert("revision".to_string(), json!(revision));
            outputs
        }
        None => fallback,
    }
}

pub(super) async fn create_environment(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let org = required_str(&decl, "organization")?;
    let project = required_str(&decl, "project")?;
    let name = required_str(&decl, "name")?;
    let yaml = environment_yaml(&decl)?;

    client
        .post(
            client.api_url(&["esc", "environments", &org])?,
            Some(&json!({ "project": project, "name": name })),
        )
        .await
        .context("Failed to create environment")?;

    let revision = match put_environment_yaml(client, &org, &project, &name, &yaml).await {
        Ok(revision) => revision,
        Err(e) => {
            // An environment without its definition is removed again
            let url = client.environment_url(&org, &project, &name, &[])?;
            if let Err(cleanup) = client.delete(url).await {
                tracing::warn!("Failed to remove environment {}/{}/{}: {:#}", org, project, name, cleanup);
            }
            return Err(e.context("Failed to set environment definition"));
        }
    };

    let id = format!("{}/{}/{}", org, project, name);
    Ok(decl.materialize(id, revision_outputs(revision, Map::new())))
}

pub(super) async fn read_environment(client: &ServiceClient, id: &str, prior: Option<&Declaration>) -> Result<Option<Declaration>> {
    let (org, project, name) = split_environment_id(id)?;

    let url = client.environment_url(org, project, name, &[])?;
    let Some(yaml) = client.get_yaml_optional(url).await? else {
        return Ok(None);
    };

    let mut inputs = Map::new();
    insert_str(&mut inputs, "organization", org);
    insert_str(&mut inputs, "project", project);
    insert_str(&mut inputs, "name", name);
    inputs.insert("yaml".to_string(), Value::String(yaml.trim().to_string()));

    let outputs = prior.map(Declaration::exposed_outputs).unwrap_or_default();
    Ok(Some(Declaration::from_remote("environment", inputs)?.materialize(id, outputs)))
}

pub(super) async fn update_environment(client: &ServiceClient, old: &Declaration, new: Declaration, id: &str) -> Result<Declaration> {
    let (org, project, name) = split_environment_id(id)?;
    let yaml = environment_yaml(&new)?;
    let revision = put_environment_yaml(client, org, project, name, &yaml)
        .await
        .context("Failed to update environment")?;
    Ok(new.materialize(id, revision_outputs(revision, old.exposed_outputs())))
}

pub(super) async fn delete_environment(client: &ServiceClient, id: &str) -> Result<()> {
    let (org, project, name) = split_environment_id(id)?;
    client.delete(client.environment_url(org, project, name, &[])?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_id_accepts_legacy_form() {
        assert_eq!(split_environment_id("acme/infra/prod").unwrap(), ("acme", "infra", "prod"));
        assert_eq!(split_environment_id("acme/prod").unwrap(), ("acme", "default", "prod"));
        assert!(split_environment_id("acme").is_err());
        assert!(split_environment_id("acme//prod").is_err());
    }
}
