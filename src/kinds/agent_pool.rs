use crate::resource::{Output, Secret};

resource_kind!(
    /// A pool of self-hosted deployment agents
    AgentPool,
    AgentPoolBuilder,
    "agent-pool"
);

impl AgentPool {
    pub fn builder(organization_name: impl Into<String>, name: impl Into<String>) -> AgentPoolBuilder {
        AgentPoolBuilder {
            inputs: Default::default(),
        }
        .set("organizationName", organization_name.into())
        .set("name", name.into())
    }

    pub fn organization_name(&self) -> &str {
        self.0.input_str("organizationName").unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.0.input_str("name").unwrap_or_default()
    }

    pub fn description(&self) -> Option<&str> {
        self.0.input_str("description")
    }

    pub fn force_destroy(&self) -> bool {
        self.0.input_bool("forceDestroy").unwrap_or(false)
    }

    pub fn agent_pool_id(&self) -> Output<Option<&str>> {
        self.0.output_str("agentPoolId")
    }

    /// Token agents register with; only known right after creation
    pub fn token_value(&self) -> Output<Option<Secret<String>>> {
        self.0.secret_output("tokenValue").map(|token| {
            token
                .and_then(|t| t.expose().as_str())
                .map(|t| Secret::new(t.to_string()))
        })
    }
}

impl AgentPoolBuilder {
    pub fn description(self, description: impl Into<String>) -> Self {
        self.set("description", description.into())
    }

    /// Delete the pool even while stacks still use it
    pub fn force_destroy(self, force: bool) -> Self {
        self.set("forceDestroy", force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::Resource;
    use serde_json::{json, Map};

    #[test]
    fn test_outputs_pending_until_created() {
        let pool = AgentPool::builder("acme", "builders")
            .description("CI agents")
            .build()
            .unwrap();
        assert_eq!(pool.description(), Some("CI agents"));
        assert!(!pool.force_destroy());
        assert!(pool.agent_pool_id().is_pending());
        assert!(pool.token_value().is_pending());
    }

    #[test]
    fn test_token_is_masked_after_create() {
        let pool = AgentPool::builder("acme", "builders").build().unwrap();
        let mut outputs = Map::new();
        outputs.insert("agentPoolId".to_string(), json!("pool-1"));
        outputs.insert("tokenValue".to_string(), json!("pul-agent-token"));
        let created = AgentPool::from_declaration(
            pool.into_declaration().materialize("acme/builders/pool-1", outputs),
        )
        .unwrap();
        assert_eq!(created.agent_pool_id().resolved(), Some(Some("pool-1")));
        let token = created.token_value().resolved().flatten().unwrap();
        assert_eq!(token.expose(), "pul-agent-token");
        let shown = serde_json::to_string(&created).unwrap();
        assert!(!shown.contains("pul-agent-token"));
    }
}
