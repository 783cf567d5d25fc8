use super::enums::{WebhookFilter, WebhookFormat, WebhookGroup};
use crate::resource::{FieldValue, Output, Secret};
use serde_json::Value;

resource_kind!(
    /// Delivers organization, stack or environment events to a URL
    Webhook,
    WebhookBuilder,
    "webhook"
);

impl Webhook {
    /// An organization webhook; scope it with `stack` or `environment`
    pub fn builder(
        organization_name: impl Into<String>,
        display_name: impl Into<String>,
        payload_url: impl Into<String>,
        active: bool,
    ) -> WebhookBuilder {
        WebhookBuilder {
            inputs: Default::default(),
        }
        .set("organizationName", organization_name.into())
        .set("displayName", display_name.into())
        .set("payloadUrl", payload_url.into())
        .set("active", active)
    }

    pub fn organization_name(&self) -> &str {
        self.0.input_str("organizationName").unwrap_or_default()
    }

    pub fn display_name(&self) -> &str {
        self.0.input_str("displayName").unwrap_or_default()
    }

    pub fn payload_url(&self) -> &str {
        self.0.input_str("payloadUrl").unwrap_or_default()
    }

    pub fn active(&self) -> bool {
        self.0.input_bool("active").unwrap_or(false)
    }

    pub fn project_name(&self) -> Option<&str> {
        self.0.input_str("projectName")
    }

    pub fn stack_name(&self) -> Option<&str> {
        self.0.input_str("stackName")
    }

    pub fn environment_name(&self) -> Option<&str> {
        self.0.input_str("environmentName")
    }

    pub fn format(&self) -> WebhookFormat {
        self.0
            .input_str("format")
            .and_then(|f| f.parse().ok())
            .unwrap_or(WebhookFormat::Raw)
    }

    pub fn filters(&self) -> Vec<WebhookFilter> {
        parse_list(self.0.input_strings("filters"))
    }

    pub fn groups(&self) -> Vec<WebhookGroup> {
        parse_list(self.0.input_strings("groups"))
    }

    /// HMAC key, masked in every rendering
    pub fn secret(&self) -> Option<Secret<String>> {
        match self.0.read("secret") {
            Ok(FieldValue::Secret(secret)) => secret
                .expose()
                .as_str()
                .map(|s| Secret::new(s.to_string())),
            _ => None,
        }
    }

    /// Webhook name assigned by Pulumi Cloud
    pub fn name(&self) -> Output<Option<&str>> {
        self.0.output_str("name")
    }
}

fn parse_list<T: std::str::FromStr>(values: Option<Vec<String>>) -> Vec<T> {
    values
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.parse().ok())
        .collect()
}

impl WebhookBuilder {
    pub fn active(self, active: bool) -> Self {
        self.set("active", active)
    }

    /// Scope the webhook to a stack
    pub fn stack(self, project: impl Into<String>, stack: impl Into<String>) -> Self {
        self.set("projectName", project.into())
            .set("stackName", stack.into())
    }

    /// Scope the webhook to an ESC environment
    pub fn environment(self, project: impl Into<String>, environment: impl Into<String>) -> Self {
        self.set("projectName", project.into())
            .set("environmentName", environment.into())
    }

    pub fn format(self, format: WebhookFormat) -> Self {
        self.set("format", format.as_str())
    }

    pub fn filter(self, filter: WebhookFilter) -> Self {
        self.push("filters", filter.as_str())
    }

    pub fn group(self, group: WebhookGroup) -> Self {
        self.push("groups", group.as_str())
    }

    pub fn secret(self, secret: Secret<String>) -> Self {
        self.set("secret", Value::String(secret.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ValidationError, MASK};

    #[test]
    fn test_organization_webhook_defaults() {
        let hook = Webhook::builder("acme", "deploys", "https://example.com", true)
            .build()
            .unwrap();
        assert_eq!(hook.format(), WebhookFormat::Raw);
        assert_eq!(
            hook.groups(),
            vec![WebhookGroup::Deployments, WebhookGroup::Environments, WebhookGroup::Stacks]
        );
        assert!(hook.filters().is_empty());
        assert!(hook.name().is_pending());
    }

    #[test]
    fn test_stack_webhook_with_filters() {
        let hook = Webhook::builder("acme", "drift", "https://example.com", true)
            .stack("web", "prod")
            .format(WebhookFormat::Slack)
            .filter(WebhookFilter::DriftDetected)
            .filter(WebhookFilter::DeploymentFailed)
            .build()
            .unwrap();
        assert_eq!(hook.stack_name(), Some("prod"));
        assert_eq!(
            hook.filters(),
            vec![WebhookFilter::DriftDetected, WebhookFilter::DeploymentFailed]
        );
        assert!(hook.groups().is_empty());
    }

    #[test]
    fn test_secret_is_masked() {
        let hook = Webhook::builder("acme", "signed", "https://example.com", true)
            .secret(Secret::from("hmac-key"))
            .build()
            .unwrap();
        assert_eq!(hook.secret().map(|s| s.expose().clone()), Some("hmac-key".to_string()));
        let shown = format!("{} {:?}", hook, hook);
        assert!(!shown.contains("hmac-key"));
        assert!(shown.contains(MASK));
    }

    #[test]
    fn test_rescoped_builder_gets_scope_groups() {
        let org_hook = Webhook::builder("acme", "deploys", "https://example.com", true)
            .build()
            .unwrap();
        let stack_hook = org_hook.to_builder().stack("web", "prod").build().unwrap();
        assert_eq!(
            stack_hook.groups(),
            vec![WebhookGroup::Deployments, WebhookGroup::Stacks]
        );

        let env_hook = org_hook
            .to_builder()
            .environment("default", "dev")
            .build()
            .unwrap();
        assert_eq!(env_hook.groups(), vec![WebhookGroup::Environments]);
    }

    #[test]
    fn test_stack_without_project_fails() {
        let err = Webhook::builder("acme", "x", "https://example.com", true)
            .set("stackName", "prod")
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { .. }));
    }
}
