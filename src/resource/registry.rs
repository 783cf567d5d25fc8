//! Resource Registry - Load resource schemas from JSON
//!
//! This module loads every Pulumi Cloud resource schema from embedded JSON
//! files and provides lookup functions for the rest of the crate.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/common.json"),
    include_str!("../resources/teams.json"),
    include_str!("../resources/webhooks.json"),
    include_str!("../resources/orgs.json"),
    include_str!("../resources/stacks.json"),
    include_str!("../resources/tokens.json"),
    include_str!("../resources/environments.json"),
    include_str!("../resources/deployments.json"),
];

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    String,
    Boolean,
    Integer,
    Number,
    StringList,
    StringMap,
    Object,
    ObjectList,
}

impl FieldType {
    /// Check whether a JSON value has this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Integer => value.is_i64() || value.is_u64() || is_integral_float(value),
            FieldType::Number => value.is_number(),
            FieldType::StringList => value
                .as_array()
                .map(|arr| arr.iter().all(Value::is_string))
                .unwrap_or(false),
            FieldType::StringMap => value
                .as_object()
                .map(|map| map.values().all(Value::is_string))
                .unwrap_or(false),
            FieldType::Object => value.is_object(),
            FieldType::ObjectList => value
                .as_array()
                .map(|arr| arr.iter().all(Value::is_object))
                .unwrap_or(false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::StringList => "string-list",
            FieldType::StringMap => "string-map",
            FieldType::Object => "object",
            FieldType::ObjectList => "object-list",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_integral_float(value: &Value) -> bool {
    value
        .as_f64()
        .map(|n| n.fract() == 0.0 && n.is_finite())
        .unwrap_or(false)
}

/// Field definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Must be present before submission
    #[serde(default)]
    pub required: bool,
    /// Populated by Pulumi Cloud, never by the caller
    #[serde(default)]
    pub output: bool,
    /// Never rendered in plain form
    #[serde(default)]
    pub secret: bool,
    /// Changing this field forces a replace rather than an update
    #[serde(default)]
    pub replace_on_change: bool,
    #[serde(default)]
    pub default: Option<Value>,
    /// Name of a registry enum restricting the allowed values
    #[serde(default, rename = "enum")]
    pub enum_name: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl FieldDef {
    pub fn is_input(&self) -> bool {
        !self.output
    }

    /// Allowed values, if this field is restricted to an enum
    pub fn allowed_values(&self) -> Option<&'static [Value]> {
        self.enum_name
            .as_deref()
            .and_then(get_enum)
            .map(|values| values.as_slice())
    }
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    /// Pulumi type token, e.g. `pulumiservice:index:Webhook`
    pub token: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Dispatch group used to route lifecycle calls
    pub service: String,
    /// Layout of the composite resource ID
    #[serde(default)]
    pub id_format: String,
    /// The service cannot update this kind in place
    #[serde(default)]
    pub replace_on_any_change: bool,
    /// Every update reaches the service, even with no input changes
    #[serde(default)]
    pub update_always: bool,
    pub fields: Vec<FieldDef>,
}

impl ResourceDef {
    /// Get a field definition by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_inputs(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_input() && f.required)
    }

    pub fn optional_inputs(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_input() && !f.required)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.output)
    }

    /// Fields that key the resource within its remote scope
    pub fn identity_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.replace_on_change)
    }

    pub fn secret_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.secret)
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub enums: HashMap<String, Vec<Value>>,
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            enums: HashMap::new(),
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.enums.extend(partial.enums);
            final_config.resources.extend(partial.resources);
        }

        tracing::debug!(
            "Resource registry loaded: {} kinds, {} enums",
            final_config.resources.len(),
            final_config.enums.len()
        );

        final_config
    })
}

/// Get a resource definition by kind key (e.g. `webhook`)
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get a resource kind key and definition by Pulumi type token
pub fn get_resource_by_token(token: &str) -> Option<(&'static str, &'static ResourceDef)> {
    get_registry()
        .resources
        .iter()
        .find(|(_, def)| def.token == token)
        .map(|(key, def)| (key.as_str(), def))
}

/// Resolve either a kind key or a type token to the registered key
pub fn resolve_kind(kind: &str) -> Option<(&'static str, &'static ResourceDef)> {
    if let Some((key, def)) = get_registry().resources.get_key_value(kind) {
        return Some((key.as_str(), def));
    }
    get_resource_by_token(kind)
}

/// Get all resource kind keys, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    keys.sort_unstable();
    keys
}

/// Get an enum's allowed values by name
pub fn get_enum(name: &str) -> Option<&'static Vec<Value>> {
    get_registry().enums.get(name)
}

/// Check whether a value is one of the enum's members.
/// Numbers compare by value so `101` and `101.0` are the same member.
pub fn enum_contains(values: &[Value], value: &Value) -> bool {
    values.iter().any(|member| match (member.as_f64(), value.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => member == value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(
            !registry.resources.is_empty(),
            "Registry should have resources"
        );
    }

    #[test]
    fn test_webhook_resource_exists() {
        let resource = get_resource("webhook");
        assert!(resource.is_some(), "Webhook resource should exist");

        let resource = resource.unwrap();
        assert_eq!(resource.display_name, "Webhook");
        assert_eq!(resource.token, "pulumiservice:index:Webhook");
        assert_eq!(resource.service, "webhooks");
    }

    #[test]
    fn test_get_all_resource_keys() {
        let keys = get_all_resource_keys();
        for expected in [
            "access-token",
            "agent-pool",
            "approval-rule",
            "deployment",
            "deployment-settings",
            "drift-schedule",
            "environment",
            "org-access-token",
            "oidc-issuer",
            "stack-tag",
            "team",
            "team-access-token",
            "team-environment-permission",
            "team-stack-permission",
            "ttl-schedule",
            "webhook",
        ] {
            assert!(keys.contains(&expected), "Should contain {}", expected);
        }
    }

    #[test]
    fn test_every_kind_documents_its_id() {
        for (key, def) in &get_registry().resources {
            assert!(def.id_format.starts_with('{'), "{} has no id_format", key);
        }
        assert_eq!(
            get_resource("stack-tag").unwrap().id_format,
            "{organization}/{project}/{stack}/{name}"
        );
    }

    #[test]
    fn test_only_deployments_update_always() {
        let always: Vec<&str> = get_all_resource_keys()
            .into_iter()
            .filter(|key| get_resource(key).is_some_and(|def| def.update_always))
            .collect();
        assert_eq!(always, vec!["deployment"]);
    }

    #[test]
    fn test_token_kinds_hide_token_value() {
        for key in ["access-token", "org-access-token", "team-access-token"] {
            let def = get_resource(key).unwrap();
            assert!(def.replace_on_any_change, "{}", key);
            let value = def.field("tokenValue").unwrap();
            assert!(value.output && value.secret, "{}", key);
        }
    }

    #[test]
    fn test_resolve_kind_accepts_token() {
        let (key, def) = resolve_kind("pulumiservice:index:DriftSchedule").unwrap();
        assert_eq!(key, "drift-schedule");
        assert_eq!(def.display_name, "Drift Schedule");
        assert!(resolve_kind("pulumiservice:index:Nope").is_none());
    }

    #[test]
    fn test_every_enum_reference_resolves() {
        for (key, def) in &get_registry().resources {
            for field in &def.fields {
                if let Some(name) = &field.enum_name {
                    assert!(
                        get_enum(name).is_some(),
                        "{}.{} references missing enum {}",
                        key,
                        field.name,
                        name
                    );
                }
            }
        }
    }

    #[test]
    fn test_outputs_are_never_required() {
        for (key, def) in &get_registry().resources {
            for field in def.outputs() {
                assert!(!field.required, "{}.{} is an output", key, field.name);
                assert!(field.default.is_none(), "{}.{} is an output", key, field.name);
            }
        }
    }

    #[test]
    fn test_webhook_field_contract() {
        let webhook = get_resource("webhook").unwrap();
        let required: Vec<&str> = webhook.required_inputs().map(|f| f.name.as_str()).collect();
        assert_eq!(
            required,
            vec!["active", "displayName", "organizationName", "payloadUrl"]
        );
        let outputs: Vec<&str> = webhook.outputs().map(|f| f.name.as_str()).collect();
        assert_eq!(outputs, vec!["name"]);
        assert!(webhook.field("secret").unwrap().secret);
        assert_eq!(webhook.field("format").unwrap().default, Some(json!("raw")));
    }

    #[test]
    fn test_field_type_accepts() {
        assert!(FieldType::Integer.accepts(&json!(101)));
        assert!(FieldType::Integer.accepts(&json!(101.0)));
        assert!(!FieldType::Integer.accepts(&json!(1.5)));
        assert!(FieldType::StringList.accepts(&json!(["a", "b"])));
        assert!(!FieldType::StringList.accepts(&json!(["a", 1])));
        assert!(FieldType::StringMap.accepts(&json!({"k": "v"})));
        assert!(!FieldType::Boolean.accepts(&json!("true")));
    }

    #[test]
    fn test_enum_contains_compares_numbers_by_value() {
        let scopes = get_enum("team-stack-permission-scope").unwrap();
        assert!(enum_contains(scopes, &json!(102)));
        assert!(enum_contains(scopes, &json!(102.0)));
        assert!(!enum_contains(scopes, &json!(104)));
    }
}
