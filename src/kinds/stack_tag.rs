resource_kind!(
    /// A custom `name=value` tag on a stack
    StackTag,
    StackTagBuilder,
    "stack-tag"
);

impl StackTag {
    pub fn builder(
        organization: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> StackTagBuilder {
        StackTagBuilder {
            inputs: Default::default(),
        }
        .set("organization", organization.into())
        .set("project", project.into())
        .set("stack", stack.into())
        .set("name", name.into())
        .set("value", value.into())
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

    pub fn name(&self) -> &str {
        self.0.input_str("name").unwrap_or_default()
    }

    pub fn value(&self) -> &str {
        self.0.input_str("value").unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::Resource;

    #[test]
    fn test_value_change_replaces() {
        let old = StackTag::builder("acme", "web", "prod", "owner", "ops").build().unwrap();
        let new = StackTag::builder("acme", "web", "prod", "owner", "platform")
            .build()
            .unwrap();
        assert_eq!(new.value(), "platform");
        let diff = old.diff(&new).unwrap();
        assert!(diff.requires_replace());
        assert_eq!(diff.replaced_fields(), vec!["value"]);
    }
}
