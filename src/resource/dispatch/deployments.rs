//! Deployment settings and deployment runs

use super::{copy_input, insert_str, parse_response, required_str, split_id};
use crate::resource::Declaration;
use crate::service::client::ServiceClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

// =============================================================================
// Deployment settings
// =============================================================================

/// Declared key and REST key pairs for deployment settings
const SETTINGS_RENAMES: &[(&str, &str)] = &[
    ("agentPoolId", "agentPoolID"),
    ("github", "gitHub"),
    ("repoUrl", "repoURL"),
    ("username", "userName"),
    ("preRunCommands", "PreRunCommands"),
    ("roleARN", "roleArn"),
    ("policyARNs", "policyArns"),
];

const SETTINGS_FIELDS: &[&str] = &[
    "agentPoolId",
    "sourceContext",
    "operationContext",
    "github",
    "executorContext",
    "cacheOptions",
];

/// Git credentials sent to the service as `{"secret": value}`
const GIT_AUTH_SECRETS: &[&str] = &["accessToken", "sshPrivateKey", "password"];

fn rename_keys(value: &Value, renames: &[(&str, &str)], forward: bool) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let renamed = renames
                        .iter()
                        .find_map(|(declared, remote)| match forward {
                            true if key.as_str() == *declared => Some(*remote),
                            false if key.as_str() == *remote => Some(*declared),
                            _ => None,
                        })
                        .unwrap_or(key.as_str());
                    (renamed.to_string(), rename_keys(value, renames, forward))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| rename_keys(v, renames, forward)).collect()),
        other => other.clone(),
    }
}

fn wrap_git_secrets(auth: &mut Value) {
    let Some(auth) = auth.as_object_mut() else {
        return;
    };
    for (_, value) in auth.iter_mut() {
        if value.is_object() {
            wrap_git_secrets(value);
        }
    }
    for key in GIT_AUTH_SECRETS {
        if let Some(value) = auth.get_mut(*key).filter(|v| v.is_string()) {
            *value = json!({ "secret": value.take() });
        }
    }
}

/// REST body for deployment settings, from declared settings fields
fn deployment_settings_body(settings: &Map<String, Value>) -> Value {
    let mut declared = Map::new();
    for field in SETTINGS_FIELDS {
        if let Some(value) = settings.get(*field) {
            declared.insert(field.to_string(), value.clone());
        }
    }

    let mut body = rename_keys(&Value::Object(declared), SETTINGS_RENAMES, true);
    if let Some(auth) = body.pointer_mut("/sourceContext/git/gitAuth") {
        wrap_git_secrets(auth);
    }
    if let Some(image) = body.pointer_mut("/executorContext/executorImage") {
        if image.is_string() {
            *image = json!({ "reference": image.take() });
        }
    }
    body
}

/// Declared settings fields from a REST response. Secrets come back as
/// ciphertext; those are taken from `prior` when it declares them.
fn deployment_settings_inputs(response: &Value, prior: Option<&Map<String, Value>>) -> Map<String, Value> {
    let declared = rename_keys(response, SETTINGS_RENAMES, false);
    let mut inputs = Map::new();
    for field in SETTINGS_FIELDS {
        let Some(value) = declared.get(*field) else {
            continue;
        };
        let mut value = restore_secrets(value, prior.and_then(|p| p.get(*field)));
        if let Some(image) = value.pointer_mut("/executorImage") {
            if let Some(reference) = image.get("reference").cloned() {
                *image = reference;
            }
        }
        if let Some(value) = prune(value) {
            inputs.insert(field.to_string(), value);
        }
    }
    inputs
}

fn restore_secrets(remote: &Value, prior: Option<&Value>) -> Value {
    let Value::Object(map) = remote else {
        return remote.clone();
    };
    let mut restored = Map::new();
    for (key, value) in map {
        let prior_value = prior.and_then(|p| p.get(key));
        let is_ciphertext = value.as_object().is_some_and(|o| o.contains_key("ciphertext"));
        if is_ciphertext {
            if let Some(plain) = prior_value {
                restored.insert(key.clone(), plain.clone());
            }
            continue;
        }
        restored.insert(key.clone(), restore_secrets(value, prior_value));
    }
    Value::Object(restored)
}

/// Drop nulls and empty objects the service fills in
fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune(v).map(|v| (k, v)))
                .collect();
            (!map.is_empty()).then_some(Value::Object(map))
        }
        other => Some(other),
    }
}

fn split_stack_id(id: &str) -> Result<(&str, &str, &str)> {
    let parts = split_id(id, 3, "organization/project/stack")?;
    Ok((parts[0], parts[1], parts[2]))
}

pub(super) async fn create_in_deployments(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    match decl.kind() {
        "deployment-settings" => create_deployment_settings(client, decl).await,
        "deployment" => deploy(client, decl).await,
        kind => Err(anyhow::anyhow!("Unknown deployments resource: {}", kind)),
    }
}

async fn put_deployment_settings(client: &ServiceClient, id: &str, decl: &Declaration) -> Result<()> {
    let (org, project, stack) = split_stack_id(id)?;
    let url = client.stack_url(org, project, stack, &["deployments", "settings"])?;
    client
        .put(url, &deployment_settings_body(&decl.exposed_inputs()))
        .await?;
    Ok(())
}

async fn create_deployment_settings(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let id = format!(
        "{}/{}/{}",
        required_str(&decl, "organization")?,
        required_str(&decl, "project")?,
        required_str(&decl, "stack")?
    );
    put_deployment_settings(client, &id, &decl)
        .await
        .context("Failed to create deployment settings")?;
    Ok(decl.materialize(id, Map::new()))
}

pub(super) async fn read_deployment_settings(
    client: &ServiceClient,
    id: &str,
    prior: Option<&Declaration>,
) -> Result<Option<Declaration>> {
    let (org, project, stack) = split_stack_id(id)?;

    let url = client.stack_url(org, project, stack, &["deployments", "settings"])?;
    let Some(response) = client.get_optional(url).await? else {
        return Ok(None);
    };

    let prior_inputs = prior.map(Declaration::exposed_inputs);
    let mut inputs = deployment_settings_inputs(&response, prior_inputs.as_ref());
    insert_str(&mut inputs, "organization", org);
    insert_str(&mut inputs, "project", project);
    insert_str(&mut inputs, "stack", stack);

    Ok(Some(Declaration::from_remote("deployment-settings", inputs)?.materialize(id, Map::new())))
}

pub(super) async fn update_deployment_settings(client: &ServiceClient, new: Declaration, id: &str) -> Result<Declaration> {
    put_deployment_settings(client, id, &new)
        .await
        .context("Failed to update deployment settings")?;
    Ok(new.materialize(id, Map::new()))
}

pub(super) async fn delete_deployment_settings(client: &ServiceClient, id: &str) -> Result<()> {
    let (org, project, stack) = split_stack_id(id)?;
    client
        .delete(client.stack_url(org, project, stack, &["deployments", "settings"])?)
        .await?;
    Ok(())
}

// =============================================================================
// Deployments
// =============================================================================

/// Wait between status checks of a running deployment
const DEPLOYMENT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct DeploymentCreated {
    id: String,
    #[serde(default)]
    version: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentLogs {
    #[serde(default)]
    lines: Vec<DeploymentLogLine>,
    #[serde(default)]
    next_token: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentLogLine {
    #[serde(default)]
    line: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentStatus {
    #[serde(default)]
    status: String,
}

/// Quote for a POSIX shell
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':'))
}

fn flatten_config(path: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                let child = match (path.is_empty(), is_plain_key(key)) {
                    (true, true) => key.clone(),
                    (false, true) => format!("{}.{}", path, key),
                    _ => format!("{}[{:?}]", path, key),
                };
                flatten_config(&child, &map[key], out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_config(&format!("{}[{}]", path, i), item, out);
            }
        }
        Value::String(s) => out.push((path.to_string(), s.clone())),
        Value::Null => {}
        other => out.push((path.to_string(), other.to_string())),
    }
}

/// `pulumi config set` commands reproducing a config object
fn config_commands(config: &Value) -> Vec<String> {
    let mut pairs = Vec::new();
    flatten_config("", config, &mut pairs);
    pairs
        .into_iter()
        .map(|(path, value)| {
            format!("pulumi config set --path {} {}", shell_quote(&path), shell_quote(&value))
        })
        .collect()
}

/// Deployment run request: declared settings, config commands, operation
async fn deployment_request(
    client: &ServiceClient,
    stack: (&str, &str, &str),
    settings: &Map<String, Value>,
    config: Option<&Value>,
    operation: &str,
) -> Result<Value> {
    let mut body = deployment_settings_body(settings);

    let commands = config.map(config_commands).unwrap_or_default();
    if !commands.is_empty() {
        let mut existing = body
            .pointer("/operationContext/PreRunCommands")
            .cloned();
        if existing.is_none() {
            // Keep the stack's own pre-run commands after the config commands
            let (org, project, name) = stack;
            let url = client.stack_url(org, project, name, &["deployments", "settings"])?;
            existing = client
                .get_optional(url)
                .await?
                .and_then(|s| s.pointer("/operationContext/PreRunCommands").cloned());
        }
        let mut all: Vec<Value> = commands.into_iter().map(Value::String).collect();
        if let Some(Value::Array(existing)) = existing {
            all.extend(existing);
        }
        if !body["operationContext"].is_object() {
            body["operationContext"] = json!({});
        }
        body["operationContext"]["PreRunCommands"] = Value::Array(all);
    }

    body["operation"] = json!(operation);
    body["inheritSettings"] = json!(true);
    Ok(body)
}

/// Start a deployment, follow its logs and wait for it to finish
async fn run_deployment(
    client: &ServiceClient,
    stack_id: &str,
    settings: &Map<String, Value>,
    config: Option<&Value>,
    operation: &str,
) -> Result<DeploymentCreated> {
    let (org, project, stack) = split_stack_id(stack_id)?;
    let body = deployment_request(client, (org, project, stack), settings, config, operation).await?;

    let url = client.api_url(&["preview", org, project, stack, "deployments"])?;
    let response = client
        .post(url, Some(&body))
        .await
        .with_context(|| format!("Failed to start {} deployment of {}", operation, stack_id))?;
    let deployment: DeploymentCreated = parse_response(response, "deployment")?;
    tracing::info!(
        "{} deployment {} (version {}) started for {}",
        operation,
        deployment.id,
        deployment.version,
        stack_id
    );

    let mut token = String::new();
    loop {
        let mut url = client.api_url(&["preview", org, project, stack, "deployments", &deployment.id, "logs"])?;
        if !token.is_empty() {
            url.query_pairs_mut().append_pair("continuationToken", &token);
        }
        let logs: DeploymentLogs = match client.get_optional(url).await? {
            Some(response) => parse_response(response, "deployment logs")?,
            None => DeploymentLogs::default(),
        };
        for line in &logs.lines {
            tracing::info!("[{}] {}", deployment.id, line.line.trim_end());
        }
        if logs.next_token.is_empty() {
            break;
        }
        token = logs.next_token;
    }

    let url = client.api_url(&["preview", org, project, stack, "deployments", &deployment.id])?;
    loop {
        let status: DeploymentStatus = parse_response(client.get(url.clone()).await?, "deployment status")?;
        match status.status.as_str() {
            "succeeded" => return Ok(deployment),
            "failed" => {
                return Err(anyhow::anyhow!(
                    "{} deployment {} of {} failed",
                    operation,
                    deployment.id,
                    stack_id
                ))
            }
            other => {
                tracing::debug!("deployment {} is {}", deployment.id, other);
                tokio::time::sleep(DEPLOYMENT_POLL_INTERVAL).await;
            }
        }
    }
}

fn deployment_outputs(deployment: DeploymentCreated) -> Map<String, Value> {
    let mut outputs = Map::new();
    outputs.insert("deploymentId".to_string(), Value::String(deployment.id));
    outputs.insert("version".to_string(), json!(deployment.version));
    outputs
}

pub(super) async fn deploy(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let stack = required_str(&decl, "stack")?;
    let settings = decl
        .secret_input("settings")
        .and_then(|s| s.expose().as_object().cloned())
        .unwrap_or_default();
    let deployment = run_deployment(client, &stack, &settings, decl.input("config"), "update").await?;
    Ok(decl.materialize(stack, deployment_outputs(deployment)))
}

pub(super) async fn read_deployment(client: &ServiceClient, id: &str, prior: Option<&Declaration>) -> Result<Option<Declaration>> {
    let (org, project, stack) = split_stack_id(id)?;
    if client.get_optional(client.stack_url(org, project, stack, &[])?).await?.is_none() {
        return Ok(None);
    }

    // Config and settings only live in the declaration
    let mut inputs = Map::new();
    insert_str(&mut inputs, "stack", id);
    if let Some(prior) = prior {
        copy_input(&mut inputs, prior, "config");
        copy_input(&mut inputs, prior, "settings");
    }
    let outputs = prior.map(Declaration::exposed_outputs).unwrap_or_default();
    Ok(Some(Declaration::from_remote("deployment", inputs)?.materialize(id, outputs)))
}

pub(super) async fn destroy_deployment(client: &ServiceClient, id: &str) -> Result<()> {
    run_deployment(client, id, &Map::new(), None, "destroy").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_settings_body_renames_and_wraps_secrets() {
        let settings = json!({
            "agentPoolId": "pool-1",
            "sourceContext": {"git": {
                "repoUrl": "https://github.com/acme/web.git",
                "branch": "main",
                "gitAuth": {"basicAuth": {"username": "bot", "password": "hunter2"}}
            }},
            "operationContext": {
                "preRunCommands": ["make deps"],
                "oidc": {"aws": {"roleARN": "arn:aws:iam::1:role/x", "sessionName": "deploy"}}
            },
            "github": {"repository": "acme/web"},
            "executorContext": {"executorImage": "pulumi/pulumi:latest"}
        });
        let body = deployment_settings_body(settings.as_object().unwrap());
        assert_eq!(body["agentPoolID"], json!("pool-1"));
        assert_eq!(body["gitHub"]["repository"], json!("acme/web"));
        assert_eq!(body["sourceContext"]["git"]["repoURL"], json!("https://github.com/acme/web.git"));
        assert_eq!(
            body["sourceContext"]["git"]["gitAuth"]["basicAuth"],
            json!({"userName": "bot", "password": {"secret": "hunter2"}})
        );
        assert_eq!(body["operationContext"]["PreRunCommands"], json!(["make deps"]));
        assert_eq!(body["operationContext"]["oidc"]["aws"]["roleArn"], json!("arn:aws:iam::1:role/x"));
        assert_eq!(body["executorContext"], json!({"executorImage": {"reference": "pulumi/pulumi:latest"}}));
    }

    #[test]
    fn test_deployment_settings_inputs_restore_declared_secrets() {
        let response = json!({
            "agentPoolID": "pool-1",
            "sourceContext": {"git": {
                "repoURL": "https://github.com/acme/web.git",
                "gitAuth": {"accessToken": {"ciphertext": "AAAA"}}
            }},
            "operationContext": {"environmentVariables": {"TOKEN": {"ciphertext": "BBBB"}, "REGION": "us-west-2"}},
            "executorContext": {"executorImage": {"reference": "pulumi/pulumi:latest"}},
            "cacheOptions": null
        });
        let prior = json!({
            "sourceContext": {"git": {"gitAuth": {"accessToken": "ghp_secret"}}}
        });
        let inputs = deployment_settings_inputs(&response, prior.as_object());
        assert_eq!(inputs["agentPoolId"], json!("pool-1"));
        assert_eq!(inputs["sourceContext"]["git"]["repoUrl"], json!("https://github.com/acme/web.git"));
        assert_eq!(inputs["sourceContext"]["git"]["gitAuth"]["accessToken"], json!("ghp_secret"));
        assert_eq!(inputs["operationContext"], json!({"environmentVariables": {"REGION": "us-west-2"}}));
        assert_eq!(inputs["executorContext"], json!({"executorImage": "pulumi/pulumi:latest"}));
        assert!(!inputs.contains_key("cacheOptions"));
    }

    #[test]
    fn test_config_commands_flatten_paths_in_order() {
        let config = json!({
            "web:replicas": 3,
            "web:tags": ["a", "b"],
            "aws:region": "us-west-2",
            "web:db": {"host": "db.internal", "dotted.key": "it's"}
        });
        assert_eq!(
            config_commands(&config),
            vec![
                "pulumi config set --path 'aws:region' 'us-west-2'",
                r#"pulumi config set --path 'web:db["dotted.key"]' 'it'\''s'"#,
                "pulumi config set --path 'web:db.host' 'db.internal'",
                "pulumi config set --path 'web:replicas' '3'",
                "pulumi config set --path 'web:tags[0]' 'a'",
                "pulumi config set --path 'web:tags[1]' 'b'",
            ]
        );
    }
}
