//! Deployment agent pools

use super::{copy_input, insert_str, parse_response, required_str, split_id};
use crate::resource::Declaration;
use crate::service::client::ServiceClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentPoolResponse {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    token_value: String,
}

fn agent_pool_body(decl: &Declaration) -> Value {
    let mut body = json!({ "name": decl.input_str("name").unwrap_or_default() });
    if let Some(description) = decl.input_str("description").filter(|d| !d.is_empty()) {
        body["description"] = json!(description);
    }
    body
}

pub(super) async fn create_agent_pool(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let org = required_str(&decl, "organizationName")?;
    let name = required_str(&decl, "name")?;

    let response = client
        .post(client.org_url(&org, &["agent-pools"])?, Some(&agent_pool_body(&decl)))
        .await
        .context("Failed to create agent pool")?;
    let pool: AgentPoolResponse = parse_response(response, "agent pool")?;

    let mut outputs = Map::new();
    outputs.insert("agentPoolId".to_string(), Value::String(pool.id.clone()));
    outputs.insert("tokenValue".to_string(), Value::String(pool.token_value));
    Ok(decl.materialize(format!("{}/{}/{}", org, name, pool.id), outputs))
}

pub(super) async fn read_agent_pool(client: &ServiceClient, id: &str, prior: Option<&Declaration>) -> Result<Option<Declaration>> {
    let parts = split_id(id, 3, "organization/name/agentPoolId")?;
    let (org, pool_id) = (parts[0], parts[2]);

    let url = client.org_url(org, &["agent-pools", pool_id])?;
    let Some(response) = client.get_optional(url).await? else {
        return Ok(None);
    };
    let pool: AgentPoolResponse = parse_response(response, "agent pool")?;

    let mut inputs = Map::new();
    insert_str(&mut inputs, "organizationName", org);
    insert_str(&mut inputs, "name", &pool.name);
    insert_str(&mut inputs, "description", &pool.description);
    if let Some(prior) = prior {
        copy_input(&mut inputs, prior, "forceDestroy");
    }

    let mut outputs = prior.map(Declaration::exposed_outputs).unwrap_or_default();
    outputs.insert("agentPoolId".to_string(), Value::String(pool.id));
    if !pool.token_value.is_empty() {
        outputs.insert("tokenValue".to_string(), Value::String(pool.token_value));
    }

    Ok(Some(Declaration::from_remote("agent-pool", inputs)?.materialize(id, outputs)))
}

pub(super) async fn update_agent_pool(client: &ServiceClient, old: &Declaration, new: Declaration, id: &str) -> Result<Declaration> {
    let parts = split_id(id, 3, "organization/name/agentPoolId")?;
    let (org, pool_id) = (parts[0], parts[2]);

    // forceDestroy only affects deletion
    if old.input("name") != new.input("name") || old.input("description") != new.input("description") {
        client
            .patch(client.org_url(org, &["agent-pools", pool_id])?, &agent_pool_body(&new))
            .await
            .context("Failed to update agent pool")?;
    }

    Ok(new.materialize(id, old.exposed_outputs()))
}

pub(super) async fn delete_agent_pool(client: &ServiceClient, id: &str, force: bool) -> Result<()> {
    let parts = split_id(id, 3, "organization/name/agentPoolId")?;
    let mut url = client.org_url(parts[0], &["agent-pools", parts[2]])?;
    if force {
        url.query_pairs_mut().append_pair("force", "true");
    }
    client.delete(url).await?;
    Ok(())
}
