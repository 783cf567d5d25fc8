//! Organization, stack and environment webhooks

use super::{copy_input, insert_str, parse_response, required_str};
use crate::resource::Declaration;
use crate::service::client::ServiceClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// What a webhook is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
enum WebhookScope {
    Organization {
        org: String,
    },
    Stack {
        org: String,
        project: String,
        stack: String,
    },
    Environment {
        org: String,
        project: String,
        environment: String,
    },
}

impl WebhookScope {
    fn from_declaration(decl: &Declaration) -> Result<Self> {
        let org = required_str(decl, "organizationName")?;
        let project = decl.input_str("projectName").map(str::to_string);
        let stack = decl.input_str("stackName").map(str::to_string);
        let environment = decl.input_str("environmentName").map(str::to_string);

        Ok(match (project, stack, environment) {
            (Some(project), Some(stack), None) => WebhookScope::Stack { org, project, stack },
            (Some(project), None, Some(environment)) => WebhookScope::Environment {
                org,
                project,
                environment,
            },
            _ => WebhookScope::Organization { org },
        })
    }

    /// Parse `org/name`, `org/project/stack/name` or `org/environment/project/env/name`
    fn parse_id(id: &str) -> Result<(Self, String)> {
        let parts: Vec<&str> = id.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(anyhow::anyhow!("'{}' is not a valid webhook ID", id));
        }
        match parts.as_slice() {
            [org, name] => Ok((WebhookScope::Organization { org: org.to_string() }, name.to_string())),
            [org, project, stack, name] => Ok((
                WebhookScope::Stack {
                    org: org.to_string(),
                    project: project.to_string(),
                    stack: stack.to_string(),
                },
                name.to_string(),
            )),
            [org, "environment", project, environment, name] => Ok((
                WebhookScope::Environment {
                    org: org.to_string(),
                    project: project.to_string(),
                    environment: environment.to_string(),
                },
                name.to_string(),
            )),
            _ => Err(anyhow::anyhow!("'{}' is not a valid webhook ID", id)),
        }
    }

    fn id(&self, name: &str) -> String {
        match self {
            WebhookScope::Organization { org } => format!("{}/{}", org, name),
            WebhookScope::Stack { org, project, stack } => {
                format!("{}/{}/{}/{}", org, project, stack, name)
            }
            WebhookScope::Environment {
                org,
                project,
                environment,
            } => format!("{}/environment/{}/{}/{}", org, project, environment, name),
        }
    }

    fn hooks_url(&self, client: &ServiceClient, name: Option<&str>) -> Result<url::Url> {
        let mut rest = vec!["hooks"];
        rest.extend(name);
        match self {
            WebhookScope::Organization { org } => client.org_url(org, &rest),
            WebhookScope::Stack { org, project, stack } => client.stack_url(org, project, stack, &rest),
            WebhookScope::Environment {
                org,
                project,
                environment,
            } => client.environment_url(org, project, environment, &rest),
        }
    }

    fn insert_into(&self, inputs: &mut Map<String, Value>) {
        match self {
            WebhookScope::Organization { org } => insert_str(inputs, "organizationName", org),
            WebhookScope::Stack { org, project, stack } => {
                insert_str(inputs, "organizationName", org);
                insert_str(inputs, "projectName", project);
                insert_str(inputs, "stackName", stack);
            }
            WebhookScope::Environment {
                org,
                project,
                environment,
            } => {
                insert_str(inputs, "organizationName", org);
                insert_str(inputs, "projectName", project);
                insert_str(inputs, "environmentName", environment);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookResponse {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    payload_url: String,
    name: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    filters: Option<Vec<String>>,
    #[serde(default)]
    groups: Option<Vec<String>>,
}

/// Request body shared by create and update. Carries the secret in plain form.
fn webhook_body(decl: &Declaration) -> Value {
    let inputs = decl.exposed_inputs();
    let mut body = Map::new();
    for (field, key) in [
        ("organizationName", "organizationName"),
        ("projectName", "projectName"),
        ("stackName", "stackName"),
        ("environmentName", "envName"),
        ("displayName", "displayName"),
        ("payloadUrl", "payloadUrl"),
        ("secret", "secret"),
        ("format", "format"),
        ("filters", "filters"),
        ("groups", "groups"),
    ] {
        if let Some(value) = inputs.get(field) {
            body.insert(key.to_string(), value.clone());
        }
    }
    body.insert(
        "active".to_string(),
        json!(inputs.get("active").and_then(Value::as_bool).unwrap_or(false)),
    );
    Value::Object(body)
}

pub(super) async fn create_webhook(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let scope = WebhookScope::from_declaration(&decl)?;
    let response = client
        .post(scope.hooks_url(client, None)?, Some(&webhook_body(&decl)))
        .await
        .context("Failed to create webhook")?;
    let hook: WebhookResponse = parse_response(response, "webhook")?;

    let mut outputs = Map::new();
    outputs.insert("name".to_string(), Value::String(hook.name.clone()));
    Ok(decl.materialize(scope.id(&hook.name), outputs))
}

pub(super) async fn read_webhook(client: &ServiceClient, id: &str, prior: Option<&Declaration>) -> Result<Option<Declaration>> {
    let (scope, name) = WebhookScope::parse_id(id)?;

    let Some(response) = client.get_optional(scope.hooks_url(client, Some(&name))?).await? else {
        return Ok(None);
    };
    let hook: WebhookResponse = parse_response(response, "webhook")?;

    let mut inputs = Map::new();
    scope.insert_into(&mut inputs);
    inputs.insert("active".to_string(), json!(hook.active));
    insert_str(&mut inputs, "displayName", &hook.display_name);
    insert_str(&mut inputs, "payloadUrl", &hook.payload_url);
    insert_str(&mut inputs, "format", &hook.format);
    if let Some(filters) = hook.filters.filter(|f| !f.is_empty()) {
        inputs.insert("filters".to_string(), json!(filters));
    }
    if let Some(groups) = hook.groups.filter(|g| !g.is_empty()) {
        inputs.insert("groups".to_string(), json!(groups));
    }
    if let Some(prior) = prior {
        copy_input(&mut inputs, prior, "secret");
    }

    let mut outputs = Map::new();
    outputs.insert("name".to_string(), Value::String(hook.name));
    Ok(Some(Declaration::from_remote("webhook", inputs)?.materialize(id, outputs)))
}

pub(super) async fn update_webhook(client: &ServiceClient, old: &Declaration, new: Declaration, id: &str) -> Result<Declaration> {
    let (scope, name) = WebhookScope::parse_id(id)?;

    let mut body = webhook_body(&new);
    body["name"] = json!(name);
    client
        .patch(scope.hooks_url(client, Some(&name))?, &body)
        .await
        .context("Failed to update webhook")?;

    Ok(new.materialize(id, old.exposed_outputs()))
}

pub(super) async fn delete_webhook(client: &ServiceClient, id: &str) -> Result<()> {
    let (scope, name) = WebhookScope::parse_id(id)?;
    client.delete(scope.hooks_url(client, Some(&name))?).await?;
    Ok(())
}
