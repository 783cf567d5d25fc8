//! Input checks
//!
//! Schema-driven validation shared by every resource kind, followed by the
//! kind-specific rules Pulumi Cloud enforces (webhook scoping, team types,
//! permission levels). Defaults are applied here too so a checked input
//! bag is exactly what gets declared.

use super::error::{json_type_name, ValidationError};
use super::registry::{enum_contains, get_enum, resolve_kind, FieldType, ResourceDef};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Event groups a webhook subscribes to when neither filters nor groups are given
const DEFAULT_ORGANIZATION_GROUPS: &[&str] = &["deployments", "environments", "stacks"];
const DEFAULT_STACK_GROUPS: &[&str] = &["deployments", "stacks"];
const DEFAULT_ENVIRONMENT_GROUPS: &[&str] = &["environments"];

/// Validate inputs for a kind and report every failure.
/// An empty result means the inputs would declare successfully.
pub fn check(kind: &str, inputs: &Map<String, Value>) -> Vec<ValidationError> {
    let Some((key, def)) = resolve_kind(kind) else {
        return vec![ValidationError::UnknownKind(kind.to_string())];
    };
    match checked_inputs(key, def, inputs.clone()) {
        Ok(_) => Vec::new(),
        Err(failures) => failures,
    }
}

/// Input bag that passed every check
#[derive(Debug)]
pub(crate) struct Checked {
    pub inputs: Map<String, Value>,
    /// Fields filled in here rather than supplied by the caller
    pub defaulted: BTreeSet<String>,
}

/// Run every check and return the input bag with defaults applied.
pub(crate) fn checked_inputs(
    key: &str,
    def: &ResourceDef,
    inputs: Map<String, Value>,
) -> Result<Checked, Vec<ValidationError>> {
    // Null means absent
    let mut inputs: Map<String, Value> = inputs
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .collect();

    let mut failures = schema_failures(def, &inputs);
    let mut defaulted = BTreeSet::new();

    // Integral floats such as `3600.0` are stored as integers
    for field in def.fields.iter().filter(|f| f.field_type == FieldType::Integer) {
        if let Some(value) = inputs.get_mut(&field.name) {
            let whole = value
                .as_f64()
                .filter(|n| value.is_f64() && n.fract() == 0.0 && n.is_finite());
            if let Some(n) = whole {
                *value = Value::from(n as i64);
            }
        }
    }

    for field in def.optional_inputs() {
        if let Some(default) = &field.default {
            if !inputs.contains_key(&field.name) {
                inputs.insert(field.name.clone(), default.clone());
                defaulted.insert(field.name.clone());
            }
        }
    }

    match key {
        "team" => check_team(&inputs, &mut failures),
        "webhook" => check_webhook(&mut inputs, &mut defaulted, &mut failures),
        "team-environment-permission" => check_team_environment_permission(&inputs, &mut failures),
        "ttl-schedule" => check_ttl_schedule(&inputs, &mut failures),
        "oidc-issuer" => check_oidc_issuer(&inputs, &mut failures),
        "environment" => check_environment(&mut inputs, &mut failures),
        "approval-rule" => check_approval_rule(&inputs, &mut failures),
        "deployment" => check_deployment(&inputs, &mut failures),
        _ => {}
    }

    if failures.is_empty() {
        Ok(Checked { inputs, defaulted })
    } else {
        tracing::debug!("{} failed {} check(s)", key, failures.len());
        Err(failures)
    }
}

/// Presence, type and enum checks in schema field order, then unknown fields.
fn schema_failures(def: &ResourceDef, inputs: &Map<String, Value>) -> Vec<ValidationError> {
    let mut failures = Vec::new();

    for field in &def.fields {
        let value = inputs.get(&field.name);

        if field.output {
            if value.is_some() {
                failures.push(ValidationError::OutputSupplied {
                    field: field.name.clone(),
                });
            }
            continue;
        }

        let Some(value) = value else {
            if field.required {
                failures.push(ValidationError::missing(&field.name));
            }
            continue;
        };

        if !field.field_type.accepts(value) {
            failures.push(ValidationError::TypeMismatch {
                field: field.name.clone(),
                expected: field.field_type.to_string(),
                found: json_type_name(value).to_string(),
            });
            continue;
        }

        if let Some(allowed) = field.allowed_values() {
            let members: Vec<&Value> = match field.field_type {
                FieldType::StringList => value.as_array().map(|a| a.iter().collect()).unwrap_or_default(),
                _ => vec![value],
            };
            if let Some(bad) = members.into_iter().find(|m| !enum_contains(allowed, m)) {
                failures.push(ValidationError::NotAllowed {
                    field: field.name.clone(),
                    allowed: allowed
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                    found: bad.to_string(),
                });
            }
        }
    }

    for name in inputs.keys() {
        if def.field(name).is_none() {
            failures.push(ValidationError::UnknownField {
                field: name.clone(),
            });
        }
    }

    failures
}

fn has(inputs: &Map<String, Value>, field: &str) -> bool {
    inputs.get(field).map(|v| !v.is_null()).unwrap_or(false)
}

fn check_team(inputs: &Map<String, Value>, failures: &mut Vec<ValidationError>) {
    match inputs.get("teamType").and_then(Value::as_str) {
        Some("pulumi") => {
            let named = inputs
                .get("name")
                .and_then(Value::as_str)
                .map(|s| !s.is_empty())
                .unwrap_or(false);
            if !named {
                failures.push(ValidationError::invalid(
                    "name",
                    "pulumi teams require a name",
                ));
            }
        }
        Some("github") => {
            let team_id = inputs.get("githubTeamId").and_then(Value::as_f64).unwrap_or(0.0);
            if team_id == 0.0 {
                failures.push(ValidationError::invalid(
                    "githubTeamId",
                    "github teams require a githubTeamId",
                ));
            }
        }
        _ => {}
    }
}

fn check_webhook(
    inputs: &mut Map<String, Value>,
    defaulted: &mut BTreeSet<String>,
    failures: &mut Vec<ValidationError>,
) {
    let project = has(inputs, "projectName");
    let stack = has(inputs, "stackName");
    let environment = has(inputs, "environmentName");

    if stack && !project {
        failures.push(ValidationError::invalid(
            "projectName",
            "projectName and stackName must both be specified for stack webhooks",
        ));
    }
    if environment && !project {
        failures.push(ValidationError::invalid(
            "projectName",
            "projectName and environmentName must both be specified for environment webhooks",
        ));
    }
    if environment && stack {
        failures.push(ValidationError::invalid(
            "stackName",
            "stackName needs to be empty if this is meant to be an environment webhook; \
             environmentName needs to be empty if this is meant to be a stack webhook",
        ));
    }
    if project && !stack && !environment {
        failures.push(ValidationError::invalid(
            "projectName",
            "projectName needs to be empty if this is meant to be an organization webhook; \
             otherwise provide stackName for stack webhook or environmentName for environment webhook",
        ));
    }

    if !has(inputs, "filters") && !has(inputs, "groups") {
        let groups = if stack {
            DEFAULT_STACK_GROUPS
        } else if environment {
            DEFAULT_ENVIRONMENT_GROUPS
        } else {
            DEFAULT_ORGANIZATION_GROUPS
        };
        inputs.insert(
            "groups".to_string(),
            Value::Array(groups.iter().map(|g| Value::String(g.to_string())).collect()),
        );
        defaulted.insert("groups".to_string());
    }
}

fn check_team_environment_permission(
    inputs: &Map<String, Value>,
    failures: &mut Vec<ValidationError>,
) {
    if let Some(duration) = inputs.get("maxOpenDuration").and_then(Value::as_str) {
        if let Err(e) = humantime::parse_duration(duration) {
            failures.push(ValidationError::invalid(
                "maxOpenDuration",
                format!("maxOpenDuration '{}' is not a valid duration: {}", duration, e),
            ));
        }
    }
}

fn check_ttl_schedule(inputs: &Map<String, Value>, failures: &mut Vec<ValidationError>) {
    if let Some(timestamp) = inputs.get("timestamp").and_then(Value::as_str) {
        if chrono::DateTime::parse_from_rfc3339(timestamp).is_err() {
            failures.push(ValidationError::invalid(
                "timestamp",
                format!("timestamp '{}' is not an RFC 3339 time", timestamp),
            ));
        }
    }
}

fn check_oidc_issuer(inputs: &Map<String, Value>, failures: &mut Vec<ValidationError>) {
    if let Some(seconds) = inputs.get("maxExpirationSeconds").and_then(Value::as_f64) {
        if seconds <= 0.0 {
            failures.push(ValidationError::invalid(
                "maxExpirationSeconds",
                "maxExpirationSeconds must be positive",
            ));
        }
    }

    let Some(policies) = inputs.get("policies").and_then(Value::as_array) else {
        return;
    };
    for (i, policy) in policies.iter().enumerate() {
        let field = format!("policies[{}]", i);
        for (key, enum_name) in [
            ("decision", "auth-policy-decision"),
            ("tokenType", "auth-policy-token-type"),
        ] {
            check_policy_value(&field, key, policy.get(key), enum_name, failures);
        }
        if let Some(permissions) = policy.get("authorizedPermissions").and_then(Value::as_array) {
            for permission in permissions {
                check_policy_value(
                    &field,
                    "authorizedPermissions",
                    Some(permission),
                    "auth-policy-permission-level",
                    failures,
                );
            }
        }
        if !policy.get("rules").map(Value::is_object).unwrap_or(false) {
            failures.push(ValidationError::invalid(
                &field,
                format!("{} requires a rules object", field),
            ));
        }
    }
}

fn check_policy_value(
    field: &str,
    key: &str,
    value: Option<&Value>,
    enum_name: &str,
    failures: &mut Vec<ValidationError>,
) {
    let Some(value) = value else {
        failures.push(ValidationError::missing(&format!("{}.{}", field, key)));
        return;
    };
    let Some(allowed) = get_enum(enum_name) else {
        return;
    };
    if !enum_contains(allowed, value) {
        failures.push(ValidationError::NotAllowed {
            field: format!("{}.{}", field, key),
            allowed: allowed
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            found: value.to_string(),
        });
    }
}

fn check_environment(inputs: &mut Map<String, Value>, failures: &mut Vec<ValidationError>) {
    for field in ["organization", "project", "name"] {
        if let Some(value) = inputs.get(field).and_then(Value::as_str) {
            if value.contains('/') {
                failures.push(ValidationError::invalid(
                    field,
                    format!("{} '{}' may not contain '/'", field, value),
                ));
            }
        }
    }

    // Pulumi Cloud stores the definition without surrounding whitespace
    if let Some(Value::String(yaml)) = inputs.get_mut("yaml") {
        let trimmed = yaml.trim();
        if trimmed.len() != yaml.len() {
            *yaml = trimmed.to_string();
        }
        // Only the error position is reported; the document may hold secrets
        if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(yaml) {
            let reason = match e.location() {
                Some(at) => format!("yaml is not valid YAML at line {} column {}", at.line(), at.column()),
                None => "yaml is not valid YAML".to_string(),
            };
            failures.push(ValidationError::invalid("yaml", reason));
        }
    }
}

const APPROVER_KINDS: &[&str] = &["teamName", "user", "rbacPermission"];

fn check_approval_rule(inputs: &Map<String, Value>, failures: &mut Vec<ValidationError>) {
    if let Some(environment) = inputs.get("environmentIdentifier") {
        for key in ["organization", "project", "name"] {
            if !environment.get(key).map(Value::is_string).unwrap_or(false) {
                failures.push(ValidationError::missing(&format!("environmentIdentifier.{}", key)));
            }
        }
    }

    let Some(config) = inputs.get("approvalRuleConfig") else {
        return;
    };
    if !config.get("numApprovalsRequired").map(Value::is_number).unwrap_or(false) {
        failures.push(ValidationError::missing("approvalRuleConfig.numApprovalsRequired"));
    }
    for key in ["allowSelfApproval", "requireReapprovalOnChange"] {
        if !config.get(key).map(Value::is_boolean).unwrap_or(false) {
            failures.push(ValidationError::missing(&format!("approvalRuleConfig.{}", key)));
        }
    }

    let Some(approvers) = config.get("eligibleApprovers").and_then(Value::as_array) else {
        failures.push(ValidationError::missing("approvalRuleConfig.eligibleApprovers"));
        return;
    };
    for (i, approver) in approvers.iter().enumerate() {
        let set = APPROVER_KINDS
            .iter()
            .filter(|key| approver.get(**key).map(Value::is_string).unwrap_or(false))
            .count();
        if set != 1 {
            let field = format!("approvalRuleConfig.eligibleApprovers[{}]", i);
            failures.push(ValidationError::invalid(
                &field,
                format!("{} must set exactly one of teamName, user or rbacPermission", field),
            ));
        }
    }
}

fn check_deployment(inputs: &Map<String, Value>, failures: &mut Vec<ValidationError>) {
    if let Some(stack) = inputs.get("stack").and_then(Value::as_str) {
        let parts: Vec<&str> = stack.split('/').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            failures.push(ValidationError::invalid(
                "stack",
                format!("stack '{}' must be organization/project/stack", stack),
            ));
        }
    }
}
