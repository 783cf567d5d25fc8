//! OIDC issuers and their auth policies

use super::{insert_str, parse_response, required_str, split_id};
use crate::resource::Declaration;
use crate::service::client::ServiceClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OidcIssuerResponse {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    thumbprints: Option<Vec<String>>,
    #[serde(default)]
    max_expiration: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AuthPolicyResponse {
    id: String,
    #[serde(default)]
    policies: Vec<Value>,
}

fn oidc_issuer_body(decl: &Declaration, include_url: bool) -> Value {
    let mut body = json!({ "name": decl.input_str("name").unwrap_or_default() });
    if include_url {
        body["url"] = json!(decl.input_str("url").unwrap_or_default());
    }
    if let Some(thumbprints) = decl.input("thumbprints") {
        body["thumbprints"] = thumbprints.clone();
    }
    if let Some(seconds) = decl.input_i64("maxExpirationSeconds") {
        body["maxExpiration"] = json!(seconds);
    }
    body
}

async fn get_auth_policy(client: &ServiceClient, org: &str, issuer_id: &str) -> Result<AuthPolicyResponse> {
    let url = client.org_url(org, &["auth", "policies", "oidcissuers", issuer_id])?;
    let response = client
        .get(url)
        .await
        .with_context(|| format!("Failed to retrieve auth policies for OIDC issuer {}", issuer_id))?;
    parse_response(response, "auth policy")
}

/// Replace the issuer's policies when the declaration sets any
async fn apply_auth_policies(client: &ServiceClient, org: &str, issuer_id: &str, decl: &Declaration) -> Result<()> {
    let Some(policies) = decl.input("policies").filter(|p| p.as_array().is_some_and(|a| !a.is_empty())) else {
        return Ok(());
    };
    let policy = get_auth_policy(client, org, issuer_id).await?;
    let url = client.org_url(org, &["auth", "policies", &policy.id])?;
    client
        .patch(url, &json!({ "policies": policies }))
        .await
        .with_context(|| format!("Failed to update auth policies for OIDC issuer {}", issuer_id))?;
    Ok(())
}

pub(super) async fn create_oidc_issuer(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let org = required_str(&decl, "organization")?;

    let response = client
        .post(client.org_url(&org, &["oidc", "issuers"])?, Some(&oidc_issuer_body(&decl, true)))
        .await
        .context("Failed to create OIDC issuer")?;
    let issuer: OidcIssuerResponse = parse_response(response, "OIDC issuer")?;

    if let Err(e) = apply_auth_policies(client, &org, &issuer.id, &decl).await {
        // Do not leave an issuer behind without the requested policies
        let url = client.org_url(&org, &["oidc", "issuers", &issuer.id])?;
        if let Err(cleanup) = client.delete(url).await {
            tracing::warn!("Failed to remove OIDC issuer {}: {:#}", issuer.id, cleanup);
        }
        return Err(e);
    }

    Ok(decl.materialize(format!("{}/{}", org, issuer.id), Map::new()))
}

pub(super) async fn read_oidc_issuer(client: &ServiceClient, id: &str) -> Result<Option<Declaration>> {
    let parts = split_id(id, 2, "organization/issuerId")?;
    let (org, issuer_id) = (parts[0], parts[1]);

    let url = client.org_url(org, &["oidc", "issuers", issuer_id])?;
    let Some(response) = client.get_optional(url).await? else {
        return Ok(None);
    };
    let issuer: OidcIssuerResponse = parse_response(response, "OIDC issuer")?;
    let policy = get_auth_policy(client, org, issuer_id).await?;

    let mut inputs = Map::new();
    insert_str(&mut inputs, "organization", org);
    insert_str(&mut inputs, "name", &issuer.name);
    insert_str(&mut inputs, "url", &issuer.url);
    if let Some(thumbprints) = issuer.thumbprints.filter(|t| !t.is_empty()) {
        inputs.insert("thumbprints".to_string(), json!(thumbprints));
    }
    if let Some(seconds) = issuer.max_expiration {
        inputs.insert("maxExpirationSeconds".to_string(), json!(seconds));
    }
    if !policy.policies.is_empty() {
        inputs.insert("policies".to_string(), Value::Array(policy.policies));
    }

    Ok(Some(Declaration::from_remote("oidc-issuer", inputs)?.materialize(id, Map::new())))
}

pub(super) async fn update_oidc_issuer(client: &ServiceClient, _old: &Declaration, new: Declaration, id: &str) -> Result<Declaration> {
    let parts = split_id(id, 2, "organization/issuerId")?;
    let (org, issuer_id) = (parts[0], parts[1]);

    client
        .patch(client.org_url(org, &["oidc", "issuers", issuer_id])?, &oidc_issuer_body(&new, false))
        .await
        .context("Failed to update OIDC issuer")?;
    apply_auth_policies(client, org, issuer_id, &new).await?;

    Ok(new.materialize(id, Map::new()))
}

pub(super) async fn delete_oidc_issuer(client: &ServiceClient, id: &str) -> Result<()> {
    let parts = split_id(id, 2, "organization/issuerId")?;
    client
        .delete(client.org_url(parts[0], &["oidc", "issuers", parts[1]])?)
        .await?;
    Ok(())
}
