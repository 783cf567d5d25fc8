use crate::resource::{FieldValue, Output, Secret};
use serde_json::Value;

resource_kind!(
    /// A Pulumi ESC environment
    Environment,
    EnvironmentBuilder,
    "environment"
);

impl Environment {
    /// An environment in the `default` project
    pub fn builder(
        organization: impl Into<String>,
        name: impl Into<String>,
        yaml: Secret<String>,
    ) -> EnvironmentBuilder {
        EnvironmentBuilder {
            inputs: Default::default(),
        }
        .set("organization", organization.into())
        .set("name", name.into())
        .set("yaml", Value::String(yaml.into_inner()))
    }

    pub fn organization(&self) -> &str {
        self.0.input_str("organization").unwrap_or_default()
    }

    pub fn project(&self) -> &str {
        self.0.input_str("project").unwrap_or("default")
    }

    pub fn name(&self) -> &str {
        self.0.input_str("name").unwrap_or_default()
    }

    /// Definition, which may hold secrets in plain text
    pub fn yaml(&self) -> Option<Secret<String>> {
        match self.0.read("yaml") {
            Ok(FieldValue::Secret(yaml)) => yaml.expose().as_str().map(|y| Secret::new(y.to_string())),
            _ => None,
        }
    }

    pub fn revision(&self) -> Output<Option<i64>> {
        self.0.output("revision").map(|r| r.and_then(Value::as_i64))
    }
}

impl EnvironmentBuilder {
    pub fn project(self, project: impl Into<String>) -> Self {
        self.set("project", project.into())
    }

    pub fn yaml(self, yaml: Secret<String>) -> Self {
        self.set("yaml", Value::String(yaml.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ValidationError, MASK};

    #[test]
    fn test_yaml_is_trimmed_and_masked() {
        let env = Environment::builder("acme", "dev", Secret::from("\nvalues:\n  password: hunter2\n"))
            .build()
            .unwrap();
        assert_eq!(env.project(), "default");
        assert_eq!(
            env.yaml().map(|y| y.expose().clone()),
            Some("values:\n  password: hunter2".to_string())
        );
        let shown = format!("{} {:?}", env, env);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains(MASK));
        assert!(env.revision().is_pending());
    }

    #[test]
    fn test_names_may_not_contain_slash() {
        let err = Environment::builder("acme", "team/dev", Secret::from("values: {}"))
            .build()
            .unwrap_err();
        assert_eq!(err.field(), Some("name"));
        assert!(matches!(err, ValidationError::Invalid { .. }));
    }

    #[test]
    fn test_project_change_replaces() {
        let env = Environment::builder("acme", "dev", Secret::from("values: {}"))
            .build()
            .unwrap();
        let moved = env.to_builder().project("infra").build().unwrap();
        let diff = crate::kinds::Resource::diff(&env, &moved).unwrap();
        assert_eq!(diff.replaced_fields(), vec!["project"]);
    }
}
