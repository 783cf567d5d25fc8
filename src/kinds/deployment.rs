use crate::resource::{FieldValue, Output, Secret};
use serde_json::{json, Map, Value};

resource_kind!(
    /// Pulumi Deployments configuration of a stack
    DeploymentSettings,
    DeploymentSettingsBuilder,
    "deployment-settings"
);

resource_kind!(
    /// A Pulumi Deployments update of a stack; deleting it destroys the stack's resources
    Deployment,
    DeploymentBuilder,
    "deployment"
);

/// Set `value` at `path` below `inputs[field]`, creating objects on the way
fn set_nested(inputs: &mut Map<String, Value>, field: &str, path: &[&str], value: Value) {
    let mut node = inputs
        .entry(field.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    for key in path {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = &mut node[*key];
    }
    *node = value;
}

fn secret_object(value: FieldValue<'_>) -> Option<Secret<Value>> {
    match value {
        FieldValue::Secret(secret) => Some(Secret::new(secret.expose().clone())),
        _ => None,
    }
}

impl DeploymentSettings {
    pub fn builder(
        organization: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
    ) -> DeploymentSettingsBuilder {
        DeploymentSettingsBuilder {
            inputs: Default::default(),
        }
        .set("organization", organization.into())
        .set("project", project.into())
        .set("stack", stack.into())
    }

    pub fn organization(&self) -> &str {
        self.0.input_str("organization").unwrap_or_default()
    }

    pub fn project(&self) -> &str {
        self.0.input_str("project").unwrap_or_default()
    }

    pub fn stack(&self) -> &str {
        self.0.input_str("stack").unwrap_or_default()
    }

    pub fn agent_pool_id(&self) -> Option<&str> {
        self.0.input_str("agentPoolId")
    }

    /// Source settings, which may carry git credentials
    pub fn source_context(&self) -> Option<Secret<Value>> {
        self.0.read("sourceContext").ok().and_then(secret_object)
    }

    /// Operation settings, which may carry environment variables
    pub fn operation_context(&self) -> Option<Secret<Value>> {
        self.0.read("operationContext").ok().and_then(secret_object)
    }

    pub fn github(&self) -> Option<&Value> {
        self.0.input("github")
    }

    pub fn executor_image(&self) -> Option<&str> {
        self.0
            .input("executorContext")
            .and_then(|c| c.get("executorImage"))
            .and_then(Value::as_str)
    }

    pub fn cache_enabled(&self) -> bool {
        self.0
            .input("cacheOptions")
            .and_then(|c| c.get("enable"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl DeploymentSettingsBuilder {
    pub fn agent_pool_id(self, pool: impl Into<String>) -> Self {
        self.set("agentPoolId", pool.into())
    }

    /// Deploy from a git repository branch
    pub fn git_source(mut self, repo_url: impl Into<String>, branch: impl Into<String>) -> Self {
        set_nested(&mut self.inputs, "sourceContext", &["git", "repoUrl"], json!(repo_url.into()));
        set_nested(&mut self.inputs, "sourceContext", &["git", "branch"], json!(branch.into()));
        self
    }

    /// Directory within the repository holding the Pulumi project
    pub fn repo_dir(mut self, dir: impl Into<String>) -> Self {
        set_nested(&mut self.inputs, "sourceContext", &["git", "repoDir"], json!(dir.into()));
        self
    }

    pub fn git_access_token(mut self, token: Secret<String>) -> Self {
        set_nested(
            &mut self.inputs,
            "sourceContext",
            &["git", "gitAuth", "accessToken"],
            Value::String(token.into_inner()),
        );
        self
    }

    pub fn pre_run_command(mut self, command: impl Into<String>) -> Self {
        let mut commands = self
            .inputs
            .get("operationContext")
            .and_then(|c| c.get("preRunCommands"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        commands.push(json!(command.into()));
        set_nested(&mut self.inputs, "operationContext", &["preRunCommands"], Value::Array(commands));
        self
    }

    pub fn environment_variable(mut self, name: &str, value: impl Into<String>) -> Self {
        set_nested(
            &mut self.inputs,
            "operationContext",
            &["environmentVariables", name],
            json!(value.into()),
        );
        self
    }

    /// Environment variable Pulumi Cloud stores encrypted
    pub fn secret_environment_variable(mut self, name: &str, value: Secret<String>) -> Self {
        set_nested(
            &mut self.inputs,
            "operationContext",
            &["environmentVariables", name],
            json!({ "secret": value.into_inner() }),
        );
        self
    }

    /// GitHub integration: the repository and whether pushes and pull requests deploy
    pub fn github(self, repository: impl Into<String>, deploy_commits: bool, preview_pull_requests: bool) -> Self {
        self.set(
            "github",
            json!({
                "repository": repository.into(),
                "deployCommits": deploy_commits,
                "previewPullRequests": preview_pull_requests,
            }),
        )
    }

    pub fn executor_image(self, image: impl Into<String>) -> Self {
        self.set("executorContext", json!({ "executorImage": image.into() }))
    }

    pub fn cache(self, enable: bool) -> Self {
        self.set("cacheOptions", json!({ "enable": enable }))
    }
}

impl Deployment {
    /// `stack` is `organization/project/stack`
    pub fn builder(stack: impl Into<String>) -> DeploymentBuilder {
        DeploymentBuilder {
            inputs: Default::default(),
        }
        .set("stack", stack.into())
    }

    pub fn stack(&self) -> &str {
        self.0.input_str("stack").unwrap_or_default()
    }

    pub fn config(&self) -> Option<&Value> {
        self.0.input("config")
    }

    pub fn settings(&self) -> Option<Secret<Value>> {
        self.0.read("settings").ok().and_then(secret_object)
    }

    pub fn deployment_id(&self) -> Output<Option<&str>> {
        self.0.output_str("deploymentId")
    }

    pub fn version(&self) -> Output<Option<i64>> {
        self.0.output("version").map(|v| v.and_then(Value::as_i64))
    }
}

impl DeploymentBuilder {
    /// Set a stack config value; `key` is `namespace:name`
    pub fn config(mut self, key: &str, value: impl Into<Value>) -> Self {
        set_nested(&mut self.inputs, "config", &[key], value.into());
        self
    }

    /// Settings overriding the stack's own for this deployment, in the
    /// same shape as [`DeploymentSettings`] fields
    pub fn settings(self, settings: Secret<Value>) -> Self {
        self.set("settings", settings.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::Resource;
    use crate::resource::MASK;

    #[test]
    fn test_settings_builder_nests_contexts() {
        let settings = DeploymentSettings::builder("acme", "web", "prod")
            .git_source("https://github.com/acme/web.git", "main")
            .git_access_token(Secret::from("ghp_secret"))
            .pre_run_command("make deps")
            .pre_run_command("make test")
            .environment_variable("REGION", "us-west-2")
            .executor_image("pulumi/pulumi:latest")
            .build()
            .unwrap();

        let source = settings.source_context().unwrap();
        assert_eq!(source.expose()["git"]["branch"], json!("main"));
        assert_eq!(source.expose()["git"]["gitAuth"]["accessToken"], json!("ghp_secret"));
        let operation = settings.operation_context().unwrap();
        assert_eq!(operation.expose()["preRunCommands"], json!(["make deps", "make test"]));
        assert_eq!(settings.executor_image(), Some("pulumi/pulumi:latest"));
        assert!(!settings.cache_enabled());

        let shown = format!("{} {:?}", settings, settings);
        assert!(!shown.contains("ghp_secret"));
        assert!(shown.contains(MASK));
    }

    #[test]
    fn test_stack_change_replaces_settings() {
        let settings = DeploymentSettings::builder("acme", "web", "prod").build().unwrap();
        let moved = DeploymentSettings::builder("acme", "web", "staging").build().unwrap();
        assert_eq!(settings.diff(&moved).unwrap().replaced_fields(), vec!["stack"]);
    }

    #[test]
    fn test_deployment_config_keys_keep_namespace() {
        let deployment = Deployment::builder("acme/web/prod")
            .config("aws:region", "us-west-2")
            .config("web:replicas", 3)
            .build()
            .unwrap();
        assert_eq!(
            deployment.config(),
            Some(&json!({"aws:region": "us-west-2", "web:replicas": 3}))
        );
        assert!(deployment.version().is_pending());
    }

    #[test]
    fn test_deployment_stack_must_be_qualified() {
        let err = Deployment::builder("prod").build().unwrap_err();
        assert_eq!(err.field(), Some("stack"));
    }
}
