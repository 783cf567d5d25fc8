//! Teams and their stack and environment permissions

use super::{copy_input, insert_str, is_conflict, parse_response, required_str, split_id};
use crate::resource::Declaration;
use crate::service::client::ServiceClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamResponse {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    members: Vec<TeamMemberResponse>,
    #[serde(default)]
    stacks: Vec<TeamStackResponse>,
    #[serde(default)]
    environments: Vec<TeamEnvironmentResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamMemberResponse {
    #[serde(default)]
    github_login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamStackResponse {
    project_name: String,
    stack_name: String,
    permission: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeamEnvironmentResponse {
    env_name: String,
    #[serde(default)]
    project_name: String,
    permission: String,
    #[serde(default)]
    max_open_duration: Option<String>,
}

pub(super) async fn create_in_teams(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    match decl.kind() {
        "team" => create_team(client, decl).await,
        "team-stack-permission" => create_team_stack_permission(client, decl).await,
        "team-environment-permission" => create_team_environment_permission(client, decl).await,
        kind => Err(anyhow::anyhow!("Unknown teams resource: {}", kind)),
    }
}

async fn get_team(client: &ServiceClient, org: &str, team: &str) -> Result<Option<TeamResponse>> {
    let url = client.org_url(org, &["teams", team])?;
    match client.get_optional(url).await? {
        Some(response) => Ok(Some(parse_response(response, "team")?)),
        None => Ok(None),
    }
}

async fn patch_team(client: &ServiceClient, org: &str, team: &str, body: &Value) -> Result<()> {
    let url = client.org_url(org, &["teams", team])?;
    client.patch(url, body).await?;
    Ok(())
}

async fn add_team_member(client: &ServiceClient, org: &str, team: &str, member: &str) -> Result<()> {
    let body = json!({ "memberAction": "add", "member": member });
    match patch_team(client, org, team, &body).await {
        Ok(()) => Ok(()),
        Err(e) if is_conflict(&e) => {
            tracing::debug!("{} is already a member of {}", member, team);
            Ok(())
        }
        Err(e) => Err(e.context(format!("Failed to add {} to team {}", member, team))),
    }
}

async fn remove_team_member(client: &ServiceClient, org: &str, team: &str, member: &str) -> Result<()> {
    let body = json!({ "memberAction": "remove", "member": member });
    patch_team(client, org, team, &body)
        .await
        .with_context(|| format!("Failed to remove {} from team {}", member, team))
}

async fn create_team(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let org = required_str(&decl, "organizationName")?;
    let team_type = required_str(&decl, "teamType")?;

    let mut body = json!({
        "organization": org,
        "teamType": team_type,
        "name": decl.input_str("name").unwrap_or_default(),
        "displayName": decl.input_str("displayName").unwrap_or_default(),
        "description": decl.input_str("description").unwrap_or_default(),
    });
    if let Some(team_id) = decl.input_i64("githubTeamId").filter(|id| *id != 0) {
        body["githubTeamID"] = json!(team_id);
    }

    let url = client.org_url(&org, &["teams", &team_type])?;
    let response = client.post(url, Some(&body)).await?;
    let team: TeamResponse = parse_response(response, "team")?;

    let name = if team.name.is_empty() {
        required_str(&decl, "name")?
    } else {
        team.name
    };

    // GitHub teams sync membership from GitHub
    if team_type != "github" {
        for member in decl.input_strings("members").unwrap_or_default() {
            add_team_member(client, &org, &name, &member).await?;
        }
    }

    let decl = if decl.input_str("name") == Some(name.as_str()) {
        decl
    } else {
        let mut changes = Map::new();
        changes.insert("name".to_string(), Value::String(name.clone()));
        decl.with_inputs(changes)?
    };

    Ok(decl.materialize(format!("{}/{}", org, name), Map::new()))
}

pub(super) async fn read_team(client: &ServiceClient, id: &str, prior: Option<&Declaration>) -> Result<Option<Declaration>> {
    let parts = split_id(id, 2, "organization/teamName")?;
    let (org, name) = (parts[0], parts[1]);

    let Some(team) = get_team(client, org, name).await? else {
        return Ok(None);
    };

    let mut members: Vec<String> = team
        .members
        .into_iter()
        .map(|m| m.github_login)
        .filter(|login| !login.is_empty())
        .collect();
    members.sort();

    let mut inputs = Map::new();
    insert_str(&mut inputs, "organizationName", org);
    match prior.and_then(|p| p.input_str("teamType")) {
        Some(team_type) if team.kind.is_empty() => insert_str(&mut inputs, "teamType", team_type),
        _ => insert_str(&mut inputs, "teamType", &team.kind),
    }
    insert_str(&mut inputs, "name", &team.name);
    insert_str(&mut inputs, "displayName", &team.display_name);
    insert_str(&mut inputs, "description", &team.description);
    if !members.is_empty() {
        inputs.insert("members".to_string(), json!(members));
    }
    if let Some(prior) = prior {
        copy_input(&mut inputs, prior, "githubTeamId");
    }

    Ok(Some(Declaration::from_remote("team", inputs)?.materialize(id, Map::new())))
}

pub(super) async fn update_team(client: &ServiceClient, old: &Declaration, new: Declaration, id: &str) -> Result<Declaration> {
    let org = required_str(&new, "organizationName")?;
    let name = new
        .input_str("name")
        .or_else(|| old.input_str("name"))
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("team has no name"))?;

    if old.input("displayName") != new.input("displayName")
        || old.input("description") != new.input("description")
    {
        let body = json!({
            "newDisplayName": new.input_str("displayName").unwrap_or_default(),
            "newDescription": new.input_str("description").unwrap_or_default(),
        });
        patch_team(client, &org, &name, &body)
            .await
            .context("Failed to update team")?;
    }

    let old_members = old.input_strings("members").unwrap_or_default();
    let new_members = new.input_strings("members").unwrap_or_default();
    if old_members != new_members && new.input_str("teamType") != Some("github") {
        for member in old_members.iter().rev().filter(|m| !new_members.contains(m)) {
            remove_team_member(client, &org, &name, member).await?;
        }
        for member in new_members.iter().filter(|m| !old_members.contains(m)) {
            add_team_member(client, &org, &name, member).await?;
        }
    }

    Ok(new.materialize(id, Map::new()))
}

pub(super) async fn delete_team(client: &ServiceClient, id: &str) -> Result<()> {
    let parts = split_id(id, 2, "organization/teamName")?;
    client
        .delete(client.org_url(parts[0], &["teams", parts[1]])?)
        .await?;
    Ok(())
}

async fn create_team_stack_permission(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let org = required_str(&decl, "organization")?;
    let project = required_str(&decl, "project")?;
    let stack = required_str(&decl, "stack")?;
    let team = required_str(&decl, "team")?;
    let permission = decl
        .input_i64("permission")
        .ok_or_else(|| anyhow::anyhow!("team-stack-permission has no permission"))?;

    let body = json!({
        "addStackPermission": {
            "projectName": project,
            "stackName": stack,
            "permission": permission,
        }
    });
    patch_team(client, &org, &team, &body)
        .await
        .context("Failed to add stack permission for team")?;

    let id = format!("{}/{}/{}/{}", org, project, stack, team);
    Ok(decl.materialize(id, Map::new()))
}

pub(super) async fn read_team_stack_permission(client: &ServiceClient, id: &str) -> Result<Option<Declaration>> {
    let parts = split_id(id, 4, "organization/project/stack/team")?;
    let (org, project, stack, team) = (parts[0], parts[1], parts[2], parts[3]);

    let Some(response) = get_team(client, org, team).await? else {
        return Ok(None);
    };
    let Some(permission) = response
        .stacks
        .iter()
        .find(|s| s.project_name == project && s.stack_name == stack)
        .map(|s| s.permission)
    else {
        return Ok(None);
    };

    let inputs = json!({
        "organization": org,
        "project": project,
        "stack": stack,
        "team": team,
        "permission": permission,
    });
    let inputs = inputs.as_object().cloned().unwrap_or_default();
    Ok(Some(
        Declaration::from_remote("team-stack-permission", inputs)?.materialize(id, Map::new()),
    ))
}

pub(super) async fn delete_team_stack_permission(client: &ServiceClient, id: &str) -> Result<()> {
    let parts = split_id(id, 4, "organization/project/stack/team")?;
    let body = json!({
        "removeStack": {
            "projectName": parts[1],
            "stackName": parts[2],
        }
    });
    patch_team(client, parts[0], parts[3], &body).await
}

/// Composite ID: `organization/team/project+environment`
fn split_team_environment_id(id: &str) -> Result<(&str, &str, &str, &str)> {
    let parts = split_id(id, 3, "organization/team/project+environment")?;
    match parts[2].split_once('+') {
        Some((project, environment)) if !project.is_empty() && !environment.is_empty() => {
            Ok((parts[0], parts[1], project, environment))
        }
        Some(_) => Err(anyhow::anyhow!("'{}' is invalid, must be in the format organization/team/project+environment", id)),
        None => Ok((parts[0], parts[1], "default", parts[2])),
    }
}

/// Format a duration the way Pulumi Cloud prints it (`1h30m0s`)
fn format_service_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

async fn create_team_environment_permission(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let org = required_str(&decl, "organization")?;
    let team = required_str(&decl, "team")?;
    let environment = required_str(&decl, "environment")?;
    let project = decl.input_str("project").unwrap_or("default").to_string();
    let permission = required_str(&decl, "permission")?;

    let mut add = json!({
        "envName": environment,
        "projectName": project,
        "permission": permission,
    });
    if let Some(raw) = decl.input_str("maxOpenDuration") {
        let duration = humantime::parse_duration(raw)
            .with_context(|| format!("malformed duration '{}'", raw))?;
        add["maxOpenDuration"] = json!(format_service_duration(duration));
    }

    patch_team(client, &org, &team, &json!({ "addEnvironmentPermission": add }))
        .await
        .with_context(|| format!("Failed to add permissions for environment {} to team {}", environment, team))?;

    let id = format!("{}/{}/{}+{}", org, team, project, environment);
    Ok(decl.materialize(id, Map::new()))
}

pub(super) async fn read_team_environment_permission(
    client: &ServiceClient,
    id: &str,
    prior: Option<&Declaration>,
) -> Result<Option<Declaration>> {
    let (org, team, project, environment) = split_team_environment_id(id)?;

    let Some(response) = get_team(client, org, team).await? else {
        return Ok(None);
    };
    let Some(settings) = response.environments.into_iter().find(|e| {
        e.env_name == environment && (e.project_name.is_empty() || e.project_name == project)
    }) else {
        return Ok(None);
    };

    let mut inputs = Map::new();
    insert_str(&mut inputs, "organization", org);
    insert_str(&mut inputs, "team", team);
    insert_str(&mut inputs, "environment", environment);
    insert_str(&mut inputs, "project", project);
    insert_str(&mut inputs, "permission", &settings.permission);

    if let Some(remote) = settings.max_open_duration.filter(|d| !d.is_empty()) {
        // Keep the caller's spelling when it means the same duration
        let declared = prior
            .and_then(|p| p.input_str("maxOpenDuration"))
            .filter(|d| humantime::parse_duration(d).ok() == humantime::parse_duration(&remote).ok());
        insert_str(&mut inputs, "maxOpenDuration", declared.unwrap_or(remote.as_str()));
    }

    Ok(Some(
        Declaration::from_remote("team-environment-permission", inputs)?.materialize(id, Map::new()),
    ))
}

pub(super) async fn delete_team_environment_permission(client: &ServiceClient, id: &str) -> Result<()> {
    let (org, team, project, environment) = split_team_environment_id(id)?;
    let body = json!({
        "removeEnvironment": {
            "envName": environment,
            "projectName": project,
        }
    });
    patch_team(client, org, team, &body)
        .await
        .with_context(|| format!("Failed to remove permissions for environment {} from team {}", environment, team))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_environment_id_defaults_project() {
        assert_eq!(
            split_team_environment_id("acme/ops/infra+prod").unwrap(),
            ("acme", "ops", "infra", "prod")
        );
        assert_eq!(
            split_team_environment_id("acme/ops/prod").unwrap(),
            ("acme", "ops", "default", "prod")
        );
        assert!(split_team_environment_id("acme/ops/+prod").is_err());
    }

    #[test]
    fn test_service_duration_format() {
        use std::time::Duration;
        assert_eq!(format_service_duration(Duration::from_secs(5400)), "1h30m0s");
        assert_eq!(format_service_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_service_duration(Duration::from_secs(0)), "0s");
    }
}
