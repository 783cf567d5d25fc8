//! Stack tags

use super::{insert_str, parse_response, required_str, split_id};
use crate::resource::Declaration;
use crate::service::client::ServiceClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

#[derive(Debug, Default, Deserialize)]
struct StackResponse {
    #[serde(default)]
    tags: HashMap<String, String>,
}

pub(super) async fn create_stack_tag(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let org = required_str(&decl, "organization")?;
    let project = required_str(&decl, "project")?;
    let stack = required_str(&decl, "stack")?;
    let name = required_str(&decl, "name")?;

    let body = json!({ "name": name, "value": decl.input_str("value").unwrap_or_default() });
    client
        .post(client.stack_url(&org, &project, &stack, &["tags"])?, Some(&body))
        .await
        .context("Failed to create stack tag")?;

    let id = format!("{}/{}/{}/{}", org, project, stack, name);
    Ok(decl.materialize(id, Map::new()))
}

pub(super) async fn read_stack_tag(client: &ServiceClient, id: &str) -> Result<Option<Declaration>> {
    let parts = split_id(id, 4, "organization/project/stack/tagName")?;
    let (org, project, stack, name) = (parts[0], parts[1], parts[2], parts[3]);

    let Some(response) = client.get_optional(client.stack_url(org, project, stack, &[])?).await? else {
        return Ok(None);
    };
    let remote: StackResponse = parse_response(response, "stack")?;
    let Some(value) = remote.tags.get(name) else {
        return Ok(None);
    };

    let mut inputs = Map::new();
    insert_str(&mut inputs, "organization", org);
    insert_str(&mut inputs, "project", project);
    insert_str(&mut inputs, "stack", stack);
    insert_str(&mut inputs, "name", name);
    inputs.insert("value".to_string(), Value::String(value.clone()));

    Ok(Some(Declaration::from_remote("stack-tag", inputs)?.materialize(id, Map::new())))
}

pub(super) async fn delete_stack_tag(client: &ServiceClient, id: &str) -> Result<()> {
    let parts = split_id(id, 4, "organization/project/stack/tagName")?;
    let url = client.stack_url(parts[0], parts[1], parts[2], &["tags", parts[3]])?;
    client.delete(url).await?;
    Ok(())
}
