//! Personal, organization and team access tokens

use super::{insert_str, parse_response, required_str};
use crate::resource::Declaration;
use crate::service::client::ServiceClient;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenCreateResponse {
    id: String,
    #[serde(default)]
    token_value: String,
}

#[derive(Debug, Default, Deserialize)]
struct TokenListResponse {
    #[serde(default)]
    tokens: Vec<TokenResponse>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    admin: bool,
}

/// Owner of an access token
#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenScope {
    User,
    Organization { org: String, name: String },
    Team { org: String, team: String, name: String },
}

impl TokenScope {
    fn from_declaration(decl: &Declaration) -> Result<Self> {
        match decl.kind() {
            "access-token" => Ok(TokenScope::User),
            "org-access-token" => Ok(TokenScope::Organization {
                org: required_str(decl, "organizationName")?,
                name: required_str(decl, "name")?,
            }),
            "team-access-token" => Ok(TokenScope::Team {
                org: required_str(decl, "organizationName")?,
                team: required_str(decl, "teamName")?,
                name: required_str(decl, "name")?,
            }),
            kind => Err(anyhow::anyhow!("{} is not an access token", kind)),
        }
    }

    /// Parse an ID into its scope and token ID. Token names may contain `/`.
    fn parse_id(key: &str, id: &str) -> Result<(Self, String)> {
        let split: Vec<&str> = id.split('/').collect();
        let (scope, format, fixed) = match key {
            "access-token" => (TokenScope::User, "tokenId", 1),
            "org-access-token" => (
                TokenScope::Organization {
                    org: split[0].to_string(),
                    name: String::new(),
                },
                "organization/name/tokenId",
                3,
            ),
            "team-access-token" => (
                TokenScope::Team {
                    org: split[0].to_string(),
                    team: split.get(1).unwrap_or(&"").to_string(),
                    name: String::new(),
                },
                "organization/team/name/tokenId",
                4,
            ),
            _ => return Err(anyhow::anyhow!("{} is not an access token", key)),
        };

        let too_short = if fixed == 1 { split.len() != 1 } else { split.len() < fixed };
        if too_short || split.iter().any(|s| s.is_empty()) {
            return Err(anyhow::anyhow!("'{}' is invalid, must be in the format {}", id, format));
        }

        let token_id = split[split.len() - 1].to_string();
        let scope = match scope {
            TokenScope::Organization { org, .. } => TokenScope::Organization {
                org,
                name: split[1..split.len() - 1].join("/"),
            },
            TokenScope::Team { org, team, .. } => TokenScope::Team {
                org,
                team,
                name: split[2..split.len() - 1].join("/"),
            },
            TokenScope::User => TokenScope::User,
        };
        Ok((scope, token_id))
    }

    fn id(&self, token_id: &str) -> String {
        match self {
            TokenScope::User => token_id.to_string(),
            TokenScope::Organization { org, name } => format!("{}/{}/{}", org, name, token_id),
            TokenScope::Team { org, team, name } => format!("{}/{}/{}/{}", org, team, name, token_id),
        }
    }

    fn tokens_url(&self, client: &ServiceClient, token_id: Option<&str>) -> Result<Url> {
        let mut segments: Vec<&str> = match self {
            TokenScope::User => vec!["user", "tokens"],
            TokenScope::Organization { org, .. } => vec!["orgs", org, "tokens"],
            TokenScope::Team { org, team, .. } => vec!["orgs", org, "teams", team, "tokens"],
        };
        if let Some(token_id) = token_id {
            segments.push(token_id);
        }
        client.api_url(&segments)
    }

    fn body(&self, decl: &Declaration) -> Value {
        let description = decl.input_str("description").unwrap_or_default();
        match self {
            TokenScope::User => json!({ "description": description }),
            TokenScope::Organization { name, .. } => json!({
                "name": name,
                "description": description,
                "admin": decl.input_bool("admin").unwrap_or(false),
            }),
            TokenScope::Team { name, .. } => json!({ "name": name, "description": description }),
        }
    }
}

pub(super) async fn create_access_token(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let scope = TokenScope::from_declaration(&decl)?;
    let response = client
        .post(scope.tokens_url(client, None)?, Some(&scope.body(&decl)))
        .await
        .with_context(|| format!("Failed to create {}", decl.definition().display_name))?;
    let token: TokenCreateResponse = parse_response(response, "access token")?;

    let mut outputs = Map::new();
    outputs.insert("tokenId".to_string(), Value::String(token.id.clone()));
    outputs.insert("tokenValue".to_string(), Value::String(token.token_value));
    Ok(decl.materialize(scope.id(&token.id), outputs))
}

pub(super) async fn read_access_token(
    client: &ServiceClient,
    key: &str,
    id: &str,
    prior: Option<&Declaration>,
) -> Result<Option<Declaration>> {
    let (scope, token_id) = TokenScope::parse_id(key, id)?;

    // Tokens are only listed, never fetched one at a time
    let Some(response) = client.get_optional(scope.tokens_url(client, None)?).await? else {
        return Ok(None);
    };
    let list: TokenListResponse = parse_response(response, "access tokens")?;
    let Some(token) = list.tokens.into_iter().find(|t| t.id == token_id) else {
        return Ok(None);
    };

    let mut inputs = Map::new();
    match &scope {
        TokenScope::User => {
            inputs.insert("description".to_string(), Value::String(token.description.clone()));
        }
        TokenScope::Organization { org, name } => {
            insert_str(&mut inputs, "organizationName", org);
            insert_str(&mut inputs, "name", if token.name.is_empty() { name } else { &token.name });
            inputs.insert("admin".to_string(), json!(token.admin));
        }
        TokenScope::Team { org, team, name } => {
            insert_str(&mut inputs, "organizationName", org);
            insert_str(&mut inputs, "teamName", team);
            insert_str(&mut inputs, "name", if token.name.is_empty() { name } else { &token.name });
        }
    }
    insert_str(&mut inputs, "description", &token.description);

    // The token value is only returned on creation
    let mut outputs = prior.map(Declaration::exposed_outputs).unwrap_or_default();
    outputs.insert("tokenId".to_string(), Value::String(token.id));

    Ok(Some(Declaration::from_remote(key, inputs)?.materialize(id, outputs)))
}

pub(super) async fn delete_access_token(client: &ServiceClient, key: &str, id: &str) -> Result<()> {
    let (scope, token_id) = TokenScope::parse_id(key, id)?;
    client.delete(scope.tokens_url(client, Some(&token_id))?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_ids_allow_slashes_in_names() {
        let (scope, token_id) = TokenScope::parse_id("org-access-token", "acme/ci/deploy/tok-1").unwrap();
        assert_eq!(
            scope,
            TokenScope::Organization {
                org: "acme".into(),
                name: "ci/deploy".into()
            }
        );
        assert_eq!(token_id, "tok-1");
        assert_eq!(scope.id(&token_id), "acme/ci/deploy/tok-1");

        let (scope, _) = TokenScope::parse_id("team-access-token", "acme/ops/bot/tok-2").unwrap();
        assert_eq!(scope.id("tok-2"), "acme/ops/bot/tok-2");

        assert!(TokenScope::parse_id("access-token", "a/b").is_err());
        assert!(TokenScope::parse_id("org-access-token", "acme/tok-1").is_err());
        assert!(TokenScope::parse_id("team-access-token", "acme/ops/tok-2").is_err());
    }
}
