use super::enums::AuthPolicyDefinition;
use serde_json::Value;
use std::time::Duration;

resource_kind!(
    /// An OIDC issuer whose tokens can be exchanged for Pulumi Cloud tokens
    OidcIssuer,
    OidcIssuerBuilder,
    "oidc-issuer"
);

impl OidcIssuer {
    pub fn builder(
        organization: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
    ) -> OidcIssuerBuilder {
        OidcIssuerBuilder {
            inputs: Default::default(),
        }
        .set("organization", organization.into())
        .set("name", name.into())
        .set("url", url.into())
    }

    pub fn organization(&self) -> &str {
        self.0.input_str("organization").unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.input_str("name").unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        self.0.input_str("url").unwrap_or_default()
    }

    pub fn thumbprints(&self) -> Vec<String> {
        self.0.input_strings("thumbprints").unwrap_or_default()
    }

    pub fn max_expiration(&self) -> Option<Duration> {
        self.0
            .input_i64("maxExpirationSeconds")
            .and_then(|s| u64::try_from(s).ok())
            .map(Duration::from_secs)
    }

    /// Policies that parse; unknown shapes from the service are skipped
    pub fn policies(&self) -> Vec<AuthPolicyDefinition> {
        self.0
            .input("policies")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|p| serde_json::from_value(p.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl OidcIssuerBuilder {
    pub fn thumbprint(self, thumbprint: impl Into<String>) -> Self {
        self.push("thumbprints", thumbprint.into())
    }

    /// Longest lifetime of a token issued in exchange; whole seconds
    pub fn max_expiration(self, duration: Duration) -> Self {
        self.set("maxExpirationSeconds", duration.as_secs())
    }

    pub fn policy(self, policy: AuthPolicyDefinition) -> Self {
        match serde_json::to_value(&policy) {
            Ok(value) => self.push("policies", value),
            Err(e) => {
                tracing::warn!("Skipping unserializable auth policy: {}", e);
                self
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{AuthPolicyDecision, AuthPolicyPermissionLevel, AuthPolicyTokenType};

    #[test]
    fn test_issuer_with_policy() {
        let policy = AuthPolicyDefinition::new(AuthPolicyDecision::Allow, AuthPolicyTokenType::Organization)
            .permission(AuthPolicyPermissionLevel::Admin)
            .rule("sub", "repo:acme/*");
        let issuer = OidcIssuer::builder("acme", "github", "https://token.actions.githubusercontent.com")
            .max_expiration(Duration::from_secs(3600))
            .policy(policy.clone())
            .build()
            .unwrap();
        assert_eq!(issuer.policies(), vec![policy]);
        assert_eq!(issuer.max_expiration(), Some(Duration::from_secs(3600)));
        assert!(issuer.thumbprints().is_empty());
    }

    #[test]
    fn test_zero_expiration_rejected() {
        let err = OidcIssuer::builder("acme", "github", "https://example.com")
            .max_expiration(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err.field(), Some("maxExpirationSeconds"));
    }
}
