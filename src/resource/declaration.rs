//! Declarations
//!
//! A [`Declaration`] is one validated, immutable instance of a resource
//! kind: the input bag the caller supplied (defaults applied, secrets
//! wrapped) plus the outputs Pulumi Cloud assigned once the resource was
//! materialized. There are no setters. A changed input bag is a new
//! declaration, and [`Declaration::diff`] reports whether the change is an
//! in-place update or a replace.

use super::check::checked_inputs;
use super::error::ValidationError;
use super::registry::{resolve_kind, ResourceDef};
use super::secret::{Secret, MASK};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A value Pulumi Cloud assigns once the resource exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output<T> {
    /// Not materialized yet
    Pending,
    Resolved(T),
}

impl<T> Output<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Output::Pending)
    }

    pub fn resolved(self) -> Option<T> {
        match self {
            Output::Pending => None,
            Output::Resolved(value) => Some(value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Output<U> {
        match self {
            Output::Pending => Output::Pending,
            Output::Resolved(value) => Output::Resolved(f(value)),
        }
    }
}

/// Current reading of a declared field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// Optional input not supplied, or output the service left empty
    Unset,
    /// Output of a resource that is not materialized yet
    Pending,
    Value(&'a Value),
    Secret(&'a Secret<Value>),
}

impl<'a> FieldValue<'a> {
    pub fn is_set(&self) -> bool {
        matches!(self, FieldValue::Value(_) | FieldValue::Secret(_))
    }

    /// Plain value; secrets are never returned here
    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            FieldValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(Value::as_bool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Add,
    Delete,
    Update,
}

/// One changed input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDiff {
    pub field: String,
    pub kind: DiffKind,
    /// The change cannot be applied in place
    pub replace: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub changes: Vec<PropertyDiff>,
}

impl Diff {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn requires_replace(&self) -> bool {
        self.changes.iter().any(|c| c.replace)
    }

    pub fn replaced_fields(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.replace)
            .map(|c| c.field.as_str())
            .collect()
    }
}

#[derive(Clone)]
struct State {
    id: String,
    outputs: Map<String, Value>,
    secret_outputs: BTreeMap<String, Secret<Value>>,
}

#[derive(Clone)]
pub struct Declaration {
    kind: &'static str,
    def: &'static ResourceDef,
    inputs: Map<String, Value>,
    secrets: BTreeMap<String, Secret<Value>>,
    /// Inputs filled in by defaulting, re-derived whenever inputs change
    defaulted: BTreeSet<String>,
    state: Option<State>,
}

impl Declaration {
    /// Validate `inputs` against the kind's schema and declare it.
    ///
    /// `kind` is a registry key (`webhook`) or a type token
    /// (`pulumiservice:index:Webhook`). The first failure, in schema field
    /// order, is returned; use [`crate::resource::check`] to see them all.
    pub fn new(kind: &str, inputs: Map<String, Value>) -> Result<Self, ValidationError> {
        let (key, def) =
            resolve_kind(kind).ok_or_else(|| ValidationError::UnknownKind(kind.to_string()))?;

        let checked = checked_inputs(key, def, inputs).map_err(|failures| {
            failures
                .into_iter()
                .next()
                .unwrap_or_else(|| ValidationError::invalid("properties", "rejected"))
        })?;

        let mut plain = Map::new();
        let mut secrets = BTreeMap::new();
        for (name, value) in checked.inputs {
            let is_secret = def.field(&name).map(|f| f.secret).unwrap_or(false);
            if is_secret {
                secrets.insert(name, Secret::new(value));
            } else {
                plain.insert(name, value);
            }
        }

        Ok(Self {
            kind: key,
            def,
            inputs: plain,
            secrets,
            defaulted: checked.defaulted,
            state: None,
        })
    }

    /// Rebuild a declaration from state Pulumi Cloud reported.
    ///
    /// Remote state is authoritative, so only the field contract applies:
    /// nulls and unknown fields are dropped, defaults filled in and secrets
    /// wrapped. Kind rules are not re-run.
    pub(crate) fn from_remote(kind: &str, inputs: Map<String, Value>) -> Result<Self, ValidationError> {
        let (key, def) =
            resolve_kind(kind).ok_or_else(|| ValidationError::UnknownKind(kind.to_string()))?;

        let mut plain = Map::new();
        let mut secrets = BTreeMap::new();
        for (name, value) in inputs {
            let Some(field) = def.field(&name).filter(|f| f.is_input()) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if field.secret {
                secrets.insert(name, Secret::new(value));
            } else {
                plain.insert(name, value);
            }
        }
        let mut defaulted = BTreeSet::new();
        for field in def.optional_inputs() {
            if let Some(default) = &field.default {
                if !plain.contains_key(&field.name) && !secrets.contains_key(&field.name) {
                    plain.insert(field.name.clone(), default.clone());
                    defaulted.insert(field.name.clone());
                }
            }
        }

        Ok(Self {
            kind: key,
            def,
            inputs: plain,
            secrets,
            defaulted,
            state: None,
        })
    }

    /// Declare from a JSON object
    pub fn from_value(kind: &str, inputs: Value) -> Result<Self, ValidationError> {
        match inputs {
            Value::Object(map) => Self::new(kind, map),
            Value::Null => Self::new(kind, Map::new()),
            other => Err(ValidationError::TypeMismatch {
                field: "properties".to_string(),
                expected: "object".to_string(),
                found: super::error::json_type_name(&other).to_string(),
            }),
        }
    }

    /// Registry key of this declaration's kind
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn definition(&self) -> &'static ResourceDef {
        self.def
    }

    pub fn token(&self) -> &'static str {
        &self.def.token
    }

    /// Read an input or output field
    pub fn read(&self, field: &str) -> Result<FieldValue<'_>, ValidationError> {
        let def = self
            .def
            .field(field)
            .ok_or_else(|| ValidationError::UnknownField {
                field: field.to_string(),
            })?;

        if def.output {
            let Some(state) = &self.state else {
                return Ok(FieldValue::Pending);
            };
            if let Some(secret) = state.secret_outputs.get(field) {
                return Ok(FieldValue::Secret(secret));
            }
            return Ok(state
                .outputs
                .get(field)
                .map(FieldValue::Value)
                .unwrap_or(FieldValue::Unset));
        }

        if let Some(secret) = self.secrets.get(field) {
            return Ok(FieldValue::Secret(secret));
        }
        Ok(self
            .inputs
            .get(field)
            .map(FieldValue::Value)
            .unwrap_or(FieldValue::Unset))
    }

    /// Plain (non-secret) input value
    pub fn input(&self, field: &str) -> Option<&Value> {
        self.inputs.get(field)
    }

    pub fn input_str(&self, field: &str) -> Option<&str> {
        self.input(field).and_then(Value::as_str)
    }

    pub fn input_bool(&self, field: &str) -> Option<bool> {
        self.input(field).and_then(Value::as_bool)
    }

    pub fn input_f64(&self, field: &str) -> Option<f64> {
        self.input(field).and_then(Value::as_f64)
    }

    pub fn input_i64(&self, field: &str) -> Option<i64> {
        self.input(field).and_then(Value::as_i64)
    }

    pub fn input_strings(&self, field: &str) -> Option<Vec<String>> {
        self.input(field).and_then(Value::as_array).map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }

    /// Secret input, still wrapped
    pub fn secret_input(&self, field: &str) -> Option<&Secret<Value>> {
        self.secrets.get(field)
    }

    /// Plain output value, or `Pending` before materialization
    pub fn output(&self, field: &str) -> Output<Option<&Value>> {
        match &self.state {
            None => Output::Pending,
            Some(state) => Output::Resolved(state.outputs.get(field)),
        }
    }

    pub fn output_str(&self, field: &str) -> Output<Option<&str>> {
        self.output(field).map(|v| v.and_then(Value::as_str))
    }

    /// Secret output, still wrapped
    pub fn secret_output(&self, field: &str) -> Output<Option<&Secret<Value>>> {
        match &self.state {
            None => Output::Pending,
            Some(state) => Output::Resolved(state.secret_outputs.get(field)),
        }
    }

    /// Resource ID assigned by Pulumi Cloud
    pub fn id(&self) -> Output<&str> {
        match &self.state {
            None => Output::Pending,
            Some(state) => Output::Resolved(state.id.as_str()),
        }
    }

    pub fn is_materialized(&self) -> bool {
        self.state.is_some()
    }

    /// Identity fields and their declared values, in schema order
    pub fn identity(&self) -> Vec<(&'static str, &Value)> {
        self.def
            .identity_fields()
            .filter_map(|f| self.inputs.get(&f.name).map(|v| (f.name.as_str(), v)))
            .collect()
    }

    /// Declare a new resource with some inputs changed. `null` removes an
    /// optional input. Defaulted inputs are derived again from the merged
    /// bag. This declaration is left untouched.
    pub fn with_inputs(&self, changes: Map<String, Value>) -> Result<Declaration, ValidationError> {
        let mut merged = self.declared_inputs();
        for (name, value) in changes {
            merged.insert(name, value);
        }
        Declaration::new(self.kind, merged)
    }

    /// Compare this (old) declaration's inputs with `new`.
    pub fn diff(&self, new: &Declaration) -> Result<Diff, ValidationError> {
        if self.kind != new.kind {
            return Err(ValidationError::invalid(
                "kind",
                format!("cannot diff a {} against a {}", self.kind, new.kind),
            ));
        }

        let old_inputs = self.exposed_inputs();
        let new_inputs = new.exposed_inputs();
        let mut changes = Vec::new();

        for field in self.def.fields.iter().filter(|f| f.is_input()) {
            let kind = match (old_inputs.get(&field.name), new_inputs.get(&field.name)) {
                (None, None) => continue,
                (Some(a), Some(b)) if a == b => continue,
                (None, Some(_)) => DiffKind::Add,
                (Some(_), None) => DiffKind::Delete,
                (Some(_), Some(_)) => DiffKind::Update,
            };
            changes.push(PropertyDiff {
                field: field.name.clone(),
                kind,
                replace: self.def.replace_on_any_change || field.replace_on_change,
            });
        }

        Ok(Diff { changes })
    }

    /// Record the ID and outputs Pulumi Cloud assigned. Outputs are write-once:
    /// a declaration that is already materialized keeps its first state.
    pub(crate) fn materialize(mut self, id: impl Into<String>, outputs: Map<String, Value>) -> Self {
        if self.state.is_some() {
            tracing::warn!("{} is already materialized, keeping existing outputs", self.kind);
            return self;
        }

        let mut plain = Map::new();
        let mut secret_outputs = BTreeMap::new();
        for (name, value) in outputs {
            let Some(field) = self.def.field(&name).filter(|f| f.output) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if field.secret {
                secret_outputs.insert(name, Secret::new(value));
            } else {
                plain.insert(name, value);
            }
        }

        self.state = Some(State {
            id: id.into(),
            outputs: plain,
            secret_outputs,
        });
        self
    }

    /// Input bag with secrets in plain form, for request bodies only
    pub(crate) fn exposed_inputs(&self) -> Map<String, Value> {
        let mut all = self.inputs.clone();
        for (name, secret) in &self.secrets {
            all.insert(name.clone(), secret.expose().clone());
        }
        all
    }

    /// Inputs the caller supplied, secrets in plain form, defaults left out
    pub(crate) fn declared_inputs(&self) -> Map<String, Value> {
        let mut all = self.exposed_inputs();
        all.retain(|name, _| !self.defaulted.contains(name));
        all
    }

    /// Outputs with secrets in plain form, for carrying state across updates
    pub(crate) fn exposed_outputs(&self) -> Map<String, Value> {
        let Some(state) = &self.state else {
            return Map::new();
        };
        let mut all = state.outputs.clone();
        for (name, secret) in &state.secret_outputs {
            all.insert(name.clone(), secret.expose().clone());
        }
        all
    }

    /// Persistable rendering with every secret masked
    pub fn to_masked_value(&self) -> Value {
        let mut properties = self.inputs.clone();
        for name in self.secrets.keys() {
            properties.insert(name.clone(), Value::String(MASK.to_string()));
        }
        if let Some(state) = &self.state {
            for (name, value) in &state.outputs {
                properties.insert(name.clone(), value.clone());
            }
            for name in state.secret_outputs.keys() {
                properties.insert(name.clone(), Value::String(MASK.to_string()));
            }
        }

        serde_json::json!({
            "kind": self.kind,
            "id": self.state.as_ref().map(|s| s.id.clone()),
            "properties": properties,
        })
    }
}

impl Serialize for Declaration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_masked_value().serialize(serializer)
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.def.token, self.to_masked_value()["properties"])
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("kind", &self.kind)
            .field("inputs", &self.inputs)
            .field("secrets", &self.secrets)
            .field("id", &self.state.as_ref().map(|s| s.id.as_str()))
            .field("outputs", &self.state.as_ref().map(|s| &s.outputs))
            .field("secret_outputs", &self.state.as_ref().map(|s| &s.secret_outputs))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn webhook() -> Declaration {
        Declaration::new(
            "webhook",
            map(json!({
                "active": true,
                "displayName": "hook",
                "organizationName": "acme",
                "payloadUrl": "https://example.com"
            })),
        )
        .unwrap()
    }

    #[test]
    fn test_webhook_defaults_and_unset_secret() {
        let hook = webhook();
        assert_eq!(hook.read("format").unwrap().as_str(), Some("raw"));
        assert_eq!(hook.read("secret").unwrap(), FieldValue::Unset);
        assert_eq!(hook.read("name").unwrap(), FieldValue::Pending);
        assert!(hook.id().is_pending());
    }

    #[test]
    fn test_token_resolves_like_key() {
        let hook = Declaration::new(
            "pulumiservice:index:Webhook",
            map(json!({
                "active": false,
                "displayName": "hook",
                "organizationName": "acme",
                "payloadUrl": "https://example.com"
            })),
        )
        .unwrap();
        assert_eq!(hook.kind(), "webhook");
    }

    #[test]
    fn test_read_unknown_field() {
        assert_eq!(
            webhook().read("colour"),
            Err(ValidationError::UnknownField {
                field: "colour".into()
            })
        );
    }

    #[test]
    fn test_secret_never_rendered() {
        let hook = webhook()
            .with_inputs(map(json!({"secret": "shh-hmac-key"})))
            .unwrap();
        assert!(matches!(hook.read("secret").unwrap(), FieldValue::Secret(_)));
        assert_eq!(hook.read("secret").unwrap().as_str(), None);

        let rendered = [
            format!("{}", hook),
            format!("{:?}", hook),
            serde_json::to_string(&hook).unwrap(),
        ];
        for text in rendered {
            assert!(!text.contains("shh-hmac-key"), "leaked in {}", text);
            assert!(text.contains(MASK));
        }
        assert_eq!(hook.exposed_inputs()["secret"], json!("shh-hmac-key"));
    }

    #[test]
    fn test_materialize_is_write_once() {
        let hook = webhook().materialize("acme/abc", map(json!({"name": "abc", "bogus": 1})));
        assert_eq!(hook.id(), Output::Resolved("acme/abc"));
        assert_eq!(hook.read("name").unwrap().as_str(), Some("abc"));
        assert_eq!(hook.output_str("bogus"), Output::Resolved(None));

        let hook = hook.materialize("acme/other", map(json!({"name": "other"})));
        assert_eq!(hook.id(), Output::Resolved("acme/abc"));
        assert_eq!(hook.read("name").unwrap().as_str(), Some("abc"));
    }

    #[test]
    fn test_secret_outputs_are_masked() {
        let pool = Declaration::new(
            "agent-pool",
            map(json!({"organizationName": "acme", "name": "pool"})),
        )
        .unwrap()
        .materialize(
            "acme/pool/p-1",
            map(json!({"agentPoolId": "p-1", "tokenValue": "pul-agent-token"})),
        );
        assert!(matches!(pool.read("tokenValue").unwrap(), FieldValue::Secret(_)));
        assert!(!pool.to_string().contains("pul-agent-token"));
        assert_eq!(
            pool.secret_output("tokenValue")
                .resolved()
                .flatten()
                .map(|s| s.expose().clone()),
            Some(json!("pul-agent-token"))
        );
    }

    #[test]
    fn test_identity_change_diffs_as_replace() {
        let old = webhook();
        let renamed = old.with_inputs(map(json!({"displayName": "renamed"}))).unwrap();
        let diff = old.diff(&renamed).unwrap();
        assert!(diff.has_changes());
        assert!(!diff.requires_replace());

        let moved = old.with_inputs(map(json!({"organizationName": "other"}))).unwrap();
        let diff = old.diff(&moved).unwrap();
        assert!(diff.requires_replace());
        assert_eq!(diff.replaced_fields(), vec!["organizationName"]);

        // the first declaration keeps its identity
        assert_eq!(old.input_str("organizationName"), Some("acme"));
        assert_eq!(old.identity(), vec![("organizationName", &json!("acme"))]);
    }

    #[test]
    fn test_replace_on_any_change_kind() {
        let tag = Declaration::new(
            "stack-tag",
            map(json!({
                "organization": "acme", "project": "p", "stack": "s",
                "name": "owner", "value": "me"
            })),
        )
        .unwrap();
        let retagged = tag.with_inputs(map(json!({"value": "you"}))).unwrap();
        let diff = tag.diff(&retagged).unwrap();
        assert_eq!(
            diff.changes,
            vec![PropertyDiff {
                field: "value".into(),
                kind: DiffKind::Update,
                replace: true
            }]
        );
    }

    #[test]
    fn test_with_inputs_null_removes_optional() {
        let hook = webhook()
            .with_inputs(map(json!({"secret": "k"})))
            .unwrap();
        let cleared = hook.with_inputs(map(json!({"secret": null}))).unwrap();
        assert_eq!(cleared.read("secret").unwrap(), FieldValue::Unset);
        let diff = hook.diff(&cleared).unwrap();
        assert_eq!(diff.changes[0].kind, DiffKind::Delete);
    }

    #[test]
    fn test_diff_rejects_mixed_kinds() {
        let tag = Declaration::new(
            "stack-tag",
            map(json!({
                "organization": "acme", "project": "p", "stack": "s",
                "name": "owner", "value": "me"
            })),
        )
        .unwrap();
        assert!(webhook().diff(&tag).is_err());
    }

    #[test]
    fn test_with_inputs_rederives_default_groups() {
        let org_hook = webhook();
        assert_eq!(
            org_hook.input("groups"),
            Some(&json!(["deployments", "environments", "stacks"]))
        );

        let stack_hook = org_hook
            .with_inputs(map(json!({"projectName": "web", "stackName": "prod"})))
            .unwrap();
        assert_eq!(stack_hook.input("groups"), Some(&json!(["deployments", "stacks"])));
        assert_eq!(stack_hook.input_str("format"), Some("raw"));

        let filtered = org_hook
            .with_inputs(map(json!({"filters": ["stack_created"]})))
            .unwrap();
        assert_eq!(filtered.input("groups"), None);
    }

    #[test]
    fn test_with_inputs_keeps_declared_groups() {
        let hook = webhook()
            .with_inputs(map(json!({"groups": ["environments"]})))
            .unwrap();
        let moved = hook
            .with_inputs(map(json!({"projectName": "web", "stackName": "prod"})))
            .unwrap();
        assert_eq!(moved.input("groups"), Some(&json!(["environments"])));
    }

    #[test]
    fn test_input_i64_rejects_fractions() {
        let issuer = Declaration::new(
            "oidc-issuer",
            map(json!({
                "organization": "acme", "name": "gha",
                "url": "https://token.actions.githubusercontent.com",
                "maxExpirationSeconds": 3600
            })),
        )
        .unwrap();
        assert_eq!(issuer.input_i64("maxExpirationSeconds"), Some(3600));

        let team = Declaration::new(
            "team",
            map(json!({
                "organizationName": "acme", "teamType": "github",
                "name": "core", "githubTeamId": 12.5
            })),
        )
        .unwrap();
        assert_eq!(team.input_i64("githubTeamId"), None);
        assert_eq!(team.input_f64("githubTeamId"), Some(12.5));
    }

    #[test]
    fn test_from_value_requires_object() {
        assert!(matches!(
            Declaration::from_value("webhook", json!([1, 2])),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }
}
