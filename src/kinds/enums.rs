//! Closed value sets used by resource inputs
//!
//! Each enum mirrors a value list in `src/resources/*.json`; the
//! registry stays the source of truth for validation, these give callers
//! a typed way to fill inputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Error for a string outside an enum's value set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $wire)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $label,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum! {
    /// Where a team's membership is managed
    TeamType ("team type") {
        Pulumi => "pulumi",
        /// Membership synced from a GitHub team
        Github => "github",
    }
}

string_enum! {
    /// Level of access a team has to an environment
    EnvironmentPermission ("environment permission") {
        None => "none",
        Read => "read",
        /// Read plus opening (decrypting) the environment
        Open => "open",
        Write => "write",
        Admin => "admin",
    }
}

string_enum! {
    /// Payload format of a webhook
    WebhookFormat ("webhook format") {
        Raw => "raw",
        Slack => "slack",
        PulumiDeployments => "pulumi_deployments",
        MicrosoftTeams => "ms_teams",
    }
}

string_enum! {
    /// Event group a webhook can subscribe to
    WebhookGroup ("webhook group") {
        Stacks => "stacks",
        Deployments => "deployments",
        Environments => "environments",
    }
}

string_enum! {
    /// Individual event a webhook can subscribe to
    WebhookFilter ("webhook filter") {
        StackCreated => "stack_created",
        StackDeleted => "stack_deleted",
        UpdateSucceeded => "update_succeeded",
        UpdateFailed => "update_failed",
        PreviewSucceeded => "preview_succeeded",
        PreviewFailed => "preview_failed",
        DestroySucceeded => "destroy_succeeded",
        DestroyFailed => "destroy_failed",
        RefreshSucceeded => "refresh_succeeded",
        RefreshFailed => "refresh_failed",
        DeploymentQueued => "deployment_queued",
        DeploymentStarted => "deployment_started",
        DeploymentSucceeded => "deployment_succeeded",
        DeploymentFailed => "deployment_failed",
        DriftDetected => "drift_detected",
        DriftDetectionSucceeded => "drift_detection_succeeded",
        DriftDetectionFailed => "drift_detection_failed",
        DriftRemediationSucceeded => "drift_remediation_succeeded",
        DriftRemediationFailed => "drift_remediation_failed",
        EnvironmentCreated => "environment_created",
        EnvironmentDeleted => "environment_deleted",
        EnvironmentRevisionCreated => "environment_revision_created",
        EnvironmentRevisionRetracted => "environment_revision_retracted",
        EnvironmentRevisionTagCreated => "environment_revision_tag_created",
        EnvironmentRevisionTagDeleted => "environment_revision_tag_deleted",
        EnvironmentRevisionTagUpdated => "environment_revision_tag_updated",
        EnvironmentTagCreated => "environment_tag_created",
        EnvironmentTagDeleted => "environment_tag_deleted",
        EnvironmentTagUpdated => "environment_tag_updated",
        ImportedEnvironmentChanged => "imported_environment_changed",
    }
}

string_enum! {
    AuthPolicyDecision ("auth policy decision") {
        Deny => "deny",
        Allow => "allow",
    }
}

string_enum! {
    /// Kind of Pulumi Cloud token an OIDC token can be exchanged for
    AuthPolicyTokenType ("auth policy token type") {
        Personal => "personal",
        Team => "team",
        Organization => "organization",
        Runner => "runner",
    }
}

string_enum! {
    AuthPolicyPermissionLevel ("auth policy permission level") {
        Standard => "standard",
        Admin => "admin",
    }
}

string_enum! {
    /// Environment action an approval rule gates
    ApprovalRuleAction ("approval rule action") {
        Update => "update",
    }
}

/// Who may approve a gated change
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EligibleApprover {
    /// Any member of the team
    #[serde(rename = "teamName")]
    Team(String),
    /// One user, by login
    #[serde(rename = "user")]
    User(String),
    /// Anyone holding the RBAC permission on the environment
    #[serde(rename = "rbacPermission")]
    Permission(String),
}

/// Level of access a team has to a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamStackPermissionScope {
    Read,
    Edit,
    Admin,
}

impl TeamStackPermissionScope {
    pub const ALL: &'static [TeamStackPermissionScope] = &[
        TeamStackPermissionScope::Read,
        TeamStackPermissionScope::Edit,
        TeamStackPermissionScope::Admin,
    ];

    /// Numeric scope Pulumi Cloud uses on the wire
    pub fn as_i64(&self) -> i64 {
        match self {
            TeamStackPermissionScope::Read => 101,
            TeamStackPermissionScope::Edit => 102,
            TeamStackPermissionScope::Admin => 103,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_i64() == value)
    }
}

/// One rule deciding which OIDC tokens may be exchanged, and for what
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPolicyDefinition {
    pub decision: AuthPolicyDecision,
    pub token_type: AuthPolicyTokenType,
    /// Team the token is issued for; only with the `team` token type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    /// User the token is issued for; only with the `personal` token type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_login: Option<String>,
    #[serde(default, rename = "runnerID", skip_serializing_if = "Option::is_none")]
    pub runner_id: Option<String>,
    #[serde(default)]
    pub authorized_permissions: Vec<AuthPolicyPermissionLevel>,
    /// Claim name to expected value; values may use wildcards
    #[serde(default)]
    pub rules: BTreeMap<String, String>,
}

impl AuthPolicyDefinition {
    pub fn new(decision: AuthPolicyDecision, token_type: AuthPolicyTokenType) -> Self {
        Self {
            decision,
            token_type,
            team_name: None,
            user_login: None,
            runner_id: None,
            authorized_permissions: Vec::new(),
            rules: BTreeMap::new(),
        }
    }

    pub fn permission(mut self, level: AuthPolicyPermissionLevel) -> Self {
        self.authorized_permissions.push(level);
        self
    }

    pub fn rule(mut self, claim: impl Into<String>, value: impl Into<String>) -> Self {
        self.rules.insert(claim.into(), value.into());
        self
    }

    pub fn team_name(mut self, team: impl Into<String>) -> Self {
        self.team_name = Some(team.into());
        self
    }

    pub fn user_login(mut self, login: impl Into<String>) -> Self {
        self.user_login = Some(login.into());
        self
    }

    pub fn runner_id(mut self, runner: impl Into<String>) -> Self {
        self.runner_id = Some(runner.into());
        self
    }
}
