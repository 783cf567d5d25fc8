use super::enums::{ApprovalRuleAction, EligibleApprover};
use crate::resource::Output;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

resource_kind!(
    /// An approval rule gating changes to an ESC environment
    ApprovalRule,
    ApprovalRuleBuilder,
    "approval-rule"
);

/// How many approvals a change needs, and from whom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRuleConfig {
    pub num_approvals_required: i64,
    pub allow_self_approval: bool,
    /// Approvals are dropped when the change is edited
    pub require_reapproval_on_change: bool,
    pub eligible_approvers: Vec<EligibleApprover>,
}

impl ApprovalRuleConfig {
    pub fn new(num_approvals_required: i64) -> Self {
        Self {
            num_approvals_required,
            allow_self_approval: false,
            require_reapproval_on_change: false,
            eligible_approvers: Vec::new(),
        }
    }

    pub fn approver(mut self, approver: EligibleApprover) -> Self {
        self.eligible_approvers.push(approver);
        self
    }

    pub fn allow_self_approval(mut self, allow: bool) -> Self {
        self.allow_self_approval = allow;
        self
    }

    pub fn require_reapproval_on_change(mut self, require: bool) -> Self {
        self.require_reapproval_on_change = require;
        self
    }
}

impl ApprovalRule {
    pub fn builder(
        name: impl Into<String>,
        enabled: bool,
        organization: &str,
        project: &str,
        environment: &str,
        config: &ApprovalRuleConfig,
    ) -> ApprovalRuleBuilder {
        ApprovalRuleBuilder {
            inputs: Default::default(),
        }
        .set("name", name.into())
        .set("enabled", enabled)
        .set(
            "environmentIdentifier",
            json!({ "organization": organization, "project": project, "name": environment }),
        )
        .config(config)
    }

    pub fn name(&self) -> &str {
        self.0.input_str("name").unwrap_or_default()
    }

    pub fn enabled(&self) -> bool {
        self.0.input_bool("enabled").unwrap_or(false)
    }

    pub fn target_action_type(&self) -> ApprovalRuleAction {
        self.0
            .input_str("targetActionType")
            .and_then(|a| a.parse().ok())
            .unwrap_or(ApprovalRuleAction::Update)
    }

    /// `(organization, project, environment)`
    pub fn environment(&self) -> (&str, &str, &str) {
        let field = |key: &str| {
            self.0
                .input("environmentIdentifier")
                .and_then(|e| e.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
        };
        (field("organization"), field("project"), field("name"))
    }

    pub fn config(&self) -> Option<ApprovalRuleConfig> {
        self.0
            .input("approvalRuleConfig")
            .and_then(|c| serde_json::from_value(c.clone()).ok())
    }

    pub fn rule_id(&self) -> Output<Option<&str>> {
        self.0.output_str("ruleId")
    }
}

impl ApprovalRuleBuilder {
    pub fn enabled(self, enabled: bool) -> Self {
        self.set("enabled", enabled)
    }

    pub fn target_action_type(self, action: ApprovalRuleAction) -> Self {
        self.set("targetActionType", action.as_str())
    }

    pub fn config(self, config: &ApprovalRuleConfig) -> Self {
        match serde_json::to_value(config) {
            Ok(value) => self.set("approvalRuleConfig", value),
            Err(_) => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::Resource;

    fn config() -> ApprovalRuleConfig {
        ApprovalRuleConfig::new(2)
            .approver(EligibleApprover::Team("ops".into()))
            .approver(EligibleApprover::User("alice".into()))
            .require_reapproval_on_change(true)
    }

    #[test]
    fn test_config_round_trips_through_declaration() {
        let rule = ApprovalRule::builder("prod gate", true, "acme", "infra", "prod", &config())
            .build()
            .unwrap();
        assert_eq!(rule.environment(), ("acme", "infra", "prod"));
        assert_eq!(rule.target_action_type(), ApprovalRuleAction::Update);
        assert_eq!(rule.config(), Some(config()));
        assert!(rule.rule_id().is_pending());
    }

    #[test]
    fn test_environment_change_replaces_but_config_does_not() {
        let rule = ApprovalRule::builder("gate", true, "acme", "infra", "prod", &config())
            .build()
            .unwrap();
        let stricter = rule
            .to_builder()
            .config(&config().allow_self_approval(true))
            .build()
            .unwrap();
        assert!(!rule.diff(&stricter).unwrap().requires_replace());

        let moved = ApprovalRule::builder("gate", true, "acme", "infra", "staging", &config())
            .build()
            .unwrap();
        assert_eq!(rule.diff(&moved).unwrap().replaced_fields(), vec!["environmentIdentifier"]);
    }
}
