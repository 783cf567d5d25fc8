//! Approval rules gating ESC environment changes

use super::{insert_str, parse_response, split_id};
use crate::resource::Declaration;
use crate::service::client::ServiceClient;
use crate::service::http::ApiError;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalRuleResponse {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    rule: ApprovalRuleDetail,
    #[serde(default)]
    target: ApprovalRuleTarget,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalRuleDetail {
    #[serde(default)]
    num_approvals_required: i64,
    #[serde(default)]
    allow_self_approval: bool,
    #[serde(default)]
    require_reapproval_on_change: bool,
    #[serde(default)]
    eligible_approvers: Vec<EligibleApproverResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EligibleApproverResponse {
    #[serde(default)]
    eligibility_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    user: Option<ApproverUser>,
    #[serde(default)]
    permission: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApproverUser {
    #[serde(default)]
    github_login: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApprovalRuleTarget {
    #[serde(default)]
    action_types: Vec<String>,
    #[serde(default)]
    qualified_name: String,
}

/// The environment an approval rule gates
struct RuleEnvironment {
    org: String,
    project: String,
    name: String,
}

impl RuleEnvironment {
    fn from_declaration(decl: &Declaration) -> Result<Self> {
        let environment = decl
            .input("environmentIdentifier")
            .ok_or_else(|| anyhow::anyhow!("approval rule has no environmentIdentifier"))?;
        let field = |key: &str| {
            environment
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("environmentIdentifier has no {}", key))
        };
        Ok(Self {
            org: field("organization")?,
            project: field("project")?,
            name: field("name")?,
        })
    }

    fn id(&self, rule_id: &str) -> String {
        format!("environment/{}/{}/{}/{}", self.org, self.project, self.name, rule_id)
    }
}

/// Parse `environment/org/project/environment/ruleId`
fn split_approval_rule_id(id: &str) -> Result<(RuleEnvironment, &str)> {
    let format = "environment/organization/project/environment/ruleId";
    let parts = split_id(id, 5, format)?;
    if parts[0] != "environment" {
        return Err(anyhow::anyhow!("'{}' is invalid, must be in the format {}", id, format));
    }
    let environment = RuleEnvironment {
        org: parts[1].to_string(),
        project: parts[2].to_string(),
        name: parts[3].to_string(),
    };
    Ok((environment, parts[4]))
}

fn approver_body(approver: &Value) -> Value {
    let field = |key: &str| approver.get(key).and_then(Value::as_str);
    if let Some(team) = field("teamName") {
        json!({ "eligibilityType": "team_member", "teamName": team })
    } else if let Some(user) = field("user") {
        json!({ "eligibilityType": "specific_user", "userLogin": user })
    } else {
        json!({
            "eligibilityType": "has_permission_on_target",
            "permission": field("rbacPermission").unwrap_or_default(),
        })
    }
}

fn approval_rule_body(decl: &Declaration, environment: &RuleEnvironment) -> Value {
    let config = decl.input("approvalRuleConfig").cloned().unwrap_or_default();
    let approvers: Vec<Value> = config
        .get("eligibleApprovers")
        .and_then(Value::as_array)
        .map(|a| a.iter().map(approver_body).collect())
        .unwrap_or_default();

    json!({
        "name": decl.input_str("name").unwrap_or_default(),
        "enabled": decl.input_bool("enabled").unwrap_or(false),
        "rule": {
            "ruleType": "approval_required",
            "numApprovalsRequired": config.get("numApprovalsRequired").and_then(Value::as_i64).unwrap_or(1),
            "allowSelfApproval": config.get("allowSelfApproval").and_then(Value::as_bool).unwrap_or(false),
            "requireReapprovalOnChange": config
                .get("requireReapprovalOnChange")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            "eligibleApprovers": approvers,
        },
        "target": {
            "entityType": "environment",
            "qualifiedName": format!("{}/{}", environment.project, environment.name),
            "actionTypes": [decl.input_str("targetActionType").unwrap_or("update")],
        },
    })
}

fn approver_input(approver: &EligibleApproverResponse) -> Option<Value> {
    match approver.eligibility_type.as_str() {
        "team_member" => Some(json!({ "teamName": approver.name })),
        "specific_user" => approver
            .user
            .as_ref()
            .map(|u| json!({ "user": u.github_login })),
        "has_permission_on_target" => Some(json!({ "rbacPermission": approver.permission })),
        other => {
            tracing::warn!("Ignoring approver with unknown eligibility type '{}'", other);
            None
        }
    }
}

pub(super) async fn create_approval_rule(client: &ServiceClient, decl: Declaration) -> Result<Declaration> {
    let environment = RuleEnvironment::from_declaration(&decl)?;
    let response = client
        .post(
            client.api_url(&["change-gates", &environment.org])?,
            Some(&approval_rule_body(&decl, &environment)),
        )
        .await
        .context("Failed to create approval rule")?;
    let rule: ApprovalRuleResponse = parse_response(response, "approval rule")?;

    let mut outputs = Map::new();
    outputs.insert("ruleId".to_string(), Value::String(rule.id.clone()));
    Ok(decl.materialize(environment.id(&rule.id), outputs))
}

pub(super) async fn read_approval_rule(client: &ServiceClient, id: &str) -> Result<Option<Declaration>> {
    let (environment, rule_id) = split_approval_rule_id(id)?;

    let url = client.api_url(&["change-gates", &environment.org, rule_id])?;
    let Some(response) = client.get_optional(url).await? else {
        return Ok(None);
    };
    let rule: ApprovalRuleResponse = parse_response(response, "approval rule")?;

    let (project, name) = rule
        .target
        .qualified_name
        .split_once('/')
        .unwrap_or((environment.project.as_str(), environment.name.as_str()));
    let approvers: Vec<Value> = rule.rule.eligible_approvers.iter().filter_map(approver_input).collect();

    let mut inputs = Map::new();
    insert_str(&mut inputs, "name", &rule.name);
    inputs.insert("enabled".to_string(), json!(rule.enabled));
    insert_str(
        &mut inputs,
        "targetActionType",
        rule.target.action_types.first().map(String::as_str).unwrap_or("update"),
    );
    inputs.insert(
        "environmentIdentifier".to_string(),
        json!({ "organization": environment.org, "project": project, "name": name }),
    );
    inputs.insert(
        "approvalRuleConfig".to_string(),
        json!({
            "numApprovalsRequired": rule.rule.num_approvals_required,
            "allowSelfApproval": rule.rule.allow_self_approval,
            "requireReapprovalOnChange": rule.rule.require_reapproval_on_change,
            "eligibleApprovers": approvers,
        }),
    );

    let mut outputs = Map::new();
    outputs.insert("ruleId".to_string(), Value::String(rule.id));
    Ok(Some(Declaration::from_remote("approval-rule", inputs)?.materialize(id, outputs)))
}

pub(super) async fn update_approval_rule(client: &ServiceClient, old: &Declaration, new: Declaration, id: &str) -> Result<Declaration> {
    let (environment, rule_id) = split_approval_rule_id(id)?;
    client
        .put(
            client.api_url(&["change-gates", &environment.org, rule_id])?,
            &approval_rule_body(&new, &environment),
        )
        .await
        .context("Failed to update approval rule")?;
    Ok(new.materialize(id, old.exposed_outputs()))
}

pub(super) async fn delete_approval_rule(client: &ServiceClient, id: &str) -> Result<()> {
    let (environment, rule_id) = split_approval_rule_id(id)?;
    let url = client.api_url(&["change-gates", &environment.org, rule_id])?;
    match client.delete(url).await {
        Ok(_) => Ok(()),
        Err(e) if e.downcast_ref::<ApiError>().is_some_and(ApiError::is_not_found) => {
            tracing::debug!("approval rule {} already deleted", rule_id);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_rule_id_requires_environment_prefix() {
        let (environment, rule_id) = split_approval_rule_id("environment/acme/default/prod/r-1").unwrap();
        assert_eq!(rule_id, "r-1");
        assert_eq!(environment.id(rule_id), "environment/acme/default/prod/r-1");
        assert!(split_approval_rule_id("stack/acme/default/prod/r-1").is_err());
    }

    #[test]
    fn test_approval_rule_body_maps_approvers() {
        let decl = Declaration::from_value(
            "approval-rule",
            json!({
                "name": "gate",
                "enabled": true,
                "environmentIdentifier": {"organization": "acme", "project": "infra", "name": "prod"},
                "approvalRuleConfig": {
                    "numApprovalsRequired": 2,
                    "allowSelfApproval": false,
                    "requireReapprovalOnChange": true,
                    "eligibleApprovers": [
                        {"teamName": "ops"},
                        {"user": "alice"},
                        {"rbacPermission": "environment:write"}
                    ]
                }
            }),
        )
        .unwrap();
        let environment = RuleEnvironment::from_declaration(&decl).unwrap();
        let body = approval_rule_body(&decl, &environment);
        assert_eq!(body["target"]["qualifiedName"], json!("infra/prod"));
        assert_eq!(body["target"]["actionTypes"], json!(["update"]));
        assert_eq!(body["rule"]["numApprovalsRequired"], json!(2));
        assert_eq!(
            body["rule"]["eligibleApprovers"],
            json!([
                {"eligibilityType": "team_member", "teamName": "ops"},
                {"eligibilityType": "specific_user", "userLogin": "alice"},
                {"eligibilityType": "has_permission_on_target", "permission": "environment:write"}
            ])
        );
    }
}
